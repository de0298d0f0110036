//! Persistent per-location time index.
//!
//! The store maps a quantized location to a calendar of visit times:
//! `LocationKey -> date -> [times of day]`, with times kept in the order
//! they were recorded. History only ever grows; there is no eviction and
//! no compaction; the deployment target is a single device's lifetime of
//! pings.
//!
//! Both map levels are `BTreeMap`, so iterating the store is fully
//! deterministic and every derived view is byte-stable for a given state.
//!
//! The store persists as one self-describing JSON document together with
//! the settings that shaped it (coordinate precision, bucketing timezone).
//! Files are replaced atomically: serialize to a sibling temp file, then
//! rename over the target, so a concurrent reader never observes a torn
//! store.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{bucket_timestamp, Error, LocationKey, Result, TimezoneMode};

/// Times of day recorded under each date, in arrival order.
pub type DayLog = BTreeMap<String, Vec<String>>;

/// The in-memory history index and its persistence lifecycle.
#[derive(Debug)]
pub struct HistoryStore {
    precision: u8,
    timezone: TimezoneMode,
    points: BTreeMap<LocationKey, DayLog>,
}

/// On-disk shape of the store.
#[derive(Serialize, Deserialize)]
struct StoreFile {
    precision: u8,
    timezone: TimezoneMode,
    points: Vec<PointRecord>,
}

#[derive(Serialize, Deserialize)]
struct PointRecord {
    lon: f64,
    lat: f64,
    days: DayLog,
}

impl HistoryStore {
    /// Create an empty store with the given settings.
    pub fn new(precision: u8, timezone: TimezoneMode) -> Self {
        Self {
            precision,
            timezone,
            points: BTreeMap::new(),
        }
    }

    /// Load the store persisted at `path`.
    ///
    /// A missing file is the normal first run and yields an empty store
    /// with the requested settings. A present-but-unreadable file is an
    /// error: data was expected, so proceeding empty would silently drop
    /// history. If the file's persisted settings differ from the requested
    /// ones, the file wins: precision and timezone are immutable for the
    /// lifetime of a store file.
    pub fn load(path: &Path, precision: u8, timezone: TimezoneMode) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no history at {}, starting empty", path.display());
                return Ok(Self::new(precision, timezone));
            }
            Err(source) => {
                return Err(Error::StoreRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let file: StoreFile = serde_json::from_slice(&bytes).map_err(|source| Error::StoreCorrupt {
            path: path.to_path_buf(),
            source,
        })?;

        if file.precision != precision {
            warn!(
                "store {} was written with precision {}, ignoring requested {}",
                path.display(),
                file.precision,
                precision
            );
        }
        if file.timezone != timezone {
            warn!(
                "store {} was written with timezone {:?}, ignoring requested {:?}",
                path.display(),
                file.timezone,
                timezone
            );
        }

        let mut points = BTreeMap::new();
        for record in file.points {
            let key = LocationKey::quantize(record.lat, record.lon, file.precision);
            points.insert(key, record.days);
        }

        info!(
            "loaded history from {}: {} locations",
            path.display(),
            points.len()
        );

        Ok(Self {
            precision: file.precision,
            timezone: file.timezone,
            points,
        })
    }

    /// Quantize a coordinate pair with this store's precision.
    pub fn quantize(&self, lat: f64, lon: f64) -> LocationKey {
        LocationKey::quantize(lat, lon, self.precision)
    }

    /// Bucket a Unix timestamp with this store's timezone.
    pub fn bucket(&self, tst: i64) -> Result<(String, String)> {
        bucket_timestamp(tst, self.timezone)
    }

    /// Append `time` under `key`/`date`, creating levels as needed.
    ///
    /// Append-only: nothing is reordered and nothing is ever removed.
    pub fn record(&mut self, key: LocationKey, date: &str, time: &str) {
        self.points
            .entry(key)
            .or_default()
            .entry(date.to_string())
            .or_default()
            .push(time.to_string());
    }

    /// Serialize the whole store to `path`.
    ///
    /// Writes to a sibling temp file and renames it over the target so a
    /// crash mid-write can never leave a torn store behind.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let file = StoreFile {
            precision: self.precision,
            timezone: self.timezone,
            points: self
                .points
                .iter()
                .map(|(key, days)| PointRecord {
                    lon: key.lon(self.precision),
                    lat: key.lat(self.precision),
                    days: days.clone(),
                })
                .collect(),
        };

        let json = serde_json::to_vec(&file).map_err(|source| Error::Encode {
            what: "history store",
            source,
        })?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &json).map_err(|source| Error::StoreWrite {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| Error::StoreWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of distinct locations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total number of recorded times across all locations and dates.
    pub fn total_pings(&self) -> u64 {
        self.points
            .values()
            .flat_map(|days| days.values())
            .map(|times| times.len() as u64)
            .sum()
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn timezone(&self) -> TimezoneMode {
        self.timezone
    }

    /// Iterate locations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&LocationKey, &DayLog)> {
        self.points.iter()
    }
}
