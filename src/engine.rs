//! The tracker engine: owns the history store and keeps the persisted
//! store and the derived view files consistent.
//!
//! Every accepted live ping runs as one unit (record, persist the store,
//! rewrite the heatmap dataset, rewrite the snapshot) so the files on
//! disk always reflect a prefix of the applied pings. Callers that handle
//! pings concurrently must serialize access to the whole unit (the server
//! wraps the tracker in a mutex).

use std::io::Read;
use std::path::{Path, PathBuf};

use log::info;

use crate::history::HistoryStore;
use crate::{geojson, heatmap, import, Error, Ping, Result, TimezoneMode};

/// Where the store and the derived views live on disk.
#[derive(Debug, Clone)]
pub struct TrackerPaths {
    pub store: PathBuf,
    pub heatmap: PathBuf,
    pub snapshot: PathBuf,
}

/// The single logical writer over the history store.
#[derive(Debug)]
pub struct Tracker {
    store: HistoryStore,
    paths: TrackerPaths,
    blur: u32,
}

impl Tracker {
    /// Load the persisted store (or start empty on first run).
    pub fn open(
        paths: TrackerPaths,
        precision: u8,
        timezone: TimezoneMode,
        blur: u32,
    ) -> Result<Self> {
        let store = HistoryStore::load(&paths.store, precision, timezone)?;
        Ok(Self { store, paths, blur })
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Apply one live ping: record it, persist the store, regenerate both
    /// derived views. The store is persisted before any view is touched.
    pub fn handle_ping(&mut self, ping: &Ping) -> Result<()> {
        if !ping.is_valid() {
            return Err(Error::MalformedPing {
                reason: format!("coordinates out of range: {} {}", ping.lat, ping.lon),
            });
        }

        let key = self.store.quantize(ping.lat, ping.lon);
        let (date, time) = self.store.bucket(ping.tst)?;
        self.store.record(key, &date, &time);
        self.store.persist(&self.paths.store)?;

        info!(
            "location update from device {}: {},{} on {} at {}",
            ping.tid, ping.lat, ping.lon, date, time
        );

        heatmap::write(&self.store, self.blur, &self.paths.heatmap)?;

        let precision = self.store.precision();
        let popup = format!(
            "Device: {}<br>Date: {}<br>Time: {}",
            ping.tid, date, time
        );
        geojson::write_snapshot(
            key.lon(precision),
            key.lat(precision),
            &popup,
            &self.paths.snapshot,
        )
    }

    /// Bulk-import a location archive: stream every record into the store,
    /// persist once, regenerate the heatmap once. The snapshot is left
    /// alone: it means "most recent live ping".
    pub fn import_archive<R: Read>(&mut self, reader: R) -> Result<u64> {
        let count = import::import_archive(&mut self.store, reader)?;
        self.store.persist(&self.paths.store)?;
        heatmap::write(&self.store, self.blur, &self.paths.heatmap)?;
        Ok(count)
    }

    /// On-demand dump of the complete history as GeoJSON.
    pub fn export_history(&self, path: &Path) -> Result<()> {
        geojson::export_history(&self.store, path)
    }
}
