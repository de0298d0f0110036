//! # Whereabouts
//!
//! Aggregates location pings from a tracking device into a persistent
//! per-location history, and regenerates two derived views after every
//! update: a heatmap-weight dataset for a map front end and a single-point
//! GeoJSON snapshot of the latest ping.
//!
//! Pings arrive either live (OwnTracks-style JSON POSTs handled by
//! [`server`]) or in bulk from a Google location-history archive
//! ([`import`]). Both paths feed the same [`HistoryStore`], owned by a
//! [`Tracker`] that keeps the persisted store and the derived view files
//! consistent.
//!
//! ## Quick start
//!
//! ```rust
//! use whereabouts::{HistoryStore, TimezoneMode};
//!
//! let mut store = HistoryStore::new(4, TimezoneMode::Utc);
//! let key = store.quantize(51.5074, -0.1278);
//! let (date, time) = store.bucket(1_700_000_000).unwrap();
//! store.record(key, &date, &time);
//! assert_eq!(store.len(), 1);
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Error, Result};

// Persistent per-location time index
pub mod history;
pub use history::{DayLog, HistoryStore};

// Derived views
pub mod geojson;
pub mod heatmap;

// Bulk archive import
pub mod import;

// Tracker engine tying store and views together
pub mod engine;
pub use engine::{Tracker, TrackerPaths};

// HTTP listener for live pings
pub mod server;

// ============================================================================
// Core Types
// ============================================================================

/// Identity of a spatial aggregation bucket.
///
/// Coordinates are rounded to `precision` decimal digits and kept as
/// integers scaled by `10^precision`, so keys compare, hash and order
/// exactly. Rounding is [`f64::round`] on the scaled value, i.e. half away
/// from zero; this fixes the bucket boundaries deterministically. Two pings
/// inside the same rounding cell map to the same key; that is the intended
/// spatial deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    lon_scaled: i64,
    lat_scaled: i64,
}

impl LocationKey {
    /// Quantize a coordinate pair. Pure; any finite input is valid.
    pub fn quantize(lat: f64, lon: f64, precision: u8) -> Self {
        let scale = 10f64.powi(i32::from(precision));
        Self {
            lon_scaled: (lon * scale).round() as i64,
            lat_scaled: (lat * scale).round() as i64,
        }
    }

    /// Longitude of the cell, in degrees.
    pub fn lon(&self, precision: u8) -> f64 {
        self.lon_scaled as f64 / 10f64.powi(i32::from(precision))
    }

    /// Latitude of the cell, in degrees.
    pub fn lat(&self, precision: u8) -> f64 {
        self.lat_scaled as f64 / 10f64.powi(i32::from(precision))
    }
}

/// Timezone used to split Unix timestamps into calendar dates.
///
/// Persisted inside the store file: a history bucketed under one timezone
/// must never be silently reinterpreted under another.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TimezoneMode {
    /// Host-local wall clock (the default).
    Local,
    /// Coordinated universal time.
    Utc,
}

/// Split a Unix timestamp (seconds) into `("YYYY-MM-DD", "HH-MM-SS")`.
///
/// The time of day is hyphen-separated to stay filename- and JSON-safe.
/// Fails only for timestamps outside the representable range.
pub fn bucket_timestamp(tst: i64, timezone: TimezoneMode) -> Result<(String, String)> {
    let utc = DateTime::from_timestamp(tst, 0).ok_or(Error::TimestampOutOfRange(tst))?;
    Ok(match timezone {
        TimezoneMode::Utc => (
            utc.format("%Y-%m-%d").to_string(),
            utc.format("%H-%M-%S").to_string(),
        ),
        TimezoneMode::Local => {
            let local = utc.with_timezone(&Local);
            (
                local.format("%Y-%m-%d").to_string(),
                local.format("%H-%M-%S").to_string(),
            )
        }
    })
}

/// One location report decoded from a device POST.
#[derive(Debug, Clone, Deserialize)]
pub struct Ping {
    pub lat: f64,
    pub lon: f64,
    /// Unix seconds.
    pub tst: i64,
    /// Short device identifier, shown in the snapshot popup.
    pub tid: String,
}

impl Ping {
    /// Check that the coordinates are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lon >= -180.0
            && self.lon <= 180.0
    }
}

/// Any message a device may POST, discriminated by the `_type` field.
///
/// Only `location` payloads feed the history; everything else a device
/// publishes (`lwt`, `waypoint`, ...) is acknowledged and dropped.
#[derive(Debug, Deserialize)]
#[serde(tag = "_type", rename_all = "lowercase")]
pub enum DeviceMessage {
    Location(Ping),
    #[serde(other)]
    Other,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_collapses_nearby_points() {
        let a = LocationKey::quantize(37.12341, -122.54321, 4);
        let b = LocationKey::quantize(37.12343, -122.54323, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn quantize_separates_distinct_cells() {
        let a = LocationKey::quantize(37.12341, -122.54321, 4);
        let b = LocationKey::quantize(40.0, -74.0, 4);
        assert_ne!(a, b);
    }

    #[test]
    fn quantize_is_pure() {
        let first = LocationKey::quantize(51.5074, -0.1278, 5);
        for _ in 0..10 {
            assert_eq!(LocationKey::quantize(51.5074, -0.1278, 5), first);
        }
    }

    #[test]
    fn higher_precision_splits_cells() {
        let a = LocationKey::quantize(37.12341, -122.54321, 5);
        let b = LocationKey::quantize(37.12343, -122.54323, 5);
        assert_ne!(a, b);
    }

    #[test]
    fn key_recovers_cell_coordinates() {
        let key = LocationKey::quantize(37.12341, -122.54321, 4);
        assert_eq!(key.lat(4), 37.1234);
        assert_eq!(key.lon(4), -122.5432);
    }

    #[test]
    fn bucket_formats_utc() {
        assert_eq!(
            bucket_timestamp(0, TimezoneMode::Utc).unwrap(),
            ("1970-01-01".to_string(), "00-00-00".to_string())
        );
        assert_eq!(
            bucket_timestamp(1_700_000_000, TimezoneMode::Utc).unwrap(),
            ("2023-11-14".to_string(), "22-13-20".to_string())
        );
    }

    #[test]
    fn bucket_rejects_out_of_range() {
        assert!(bucket_timestamp(i64::MAX, TimezoneMode::Utc).is_err());
    }

    #[test]
    fn location_message_decodes() {
        let msg: DeviceMessage = serde_json::from_str(
            r#"{"_type":"location","lat":51.5074,"lon":-0.1278,"tst":1700000000,"tid":"px"}"#,
        )
        .unwrap();
        match msg {
            DeviceMessage::Location(ping) => {
                assert_eq!(ping.tid, "px");
                assert_eq!(ping.tst, 1_700_000_000);
            }
            DeviceMessage::Other => panic!("expected a location"),
        }
    }

    #[test]
    fn non_location_message_is_other() {
        let msg: DeviceMessage =
            serde_json::from_str(r#"{"_type":"lwt","tst":1700000000}"#).unwrap();
        assert!(matches!(msg, DeviceMessage::Other));
    }

    #[test]
    fn location_message_with_missing_field_fails() {
        let result: std::result::Result<DeviceMessage, _> =
            serde_json::from_str(r#"{"_type":"location","lat":51.5074,"tst":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn ping_validation_rejects_out_of_range() {
        let mut ping = Ping {
            lat: 51.5074,
            lon: -0.1278,
            tst: 1_700_000_000,
            tid: "px".to_string(),
        };
        assert!(ping.is_valid());
        ping.lat = 91.0;
        assert!(!ping.is_valid());
        ping.lat = 51.5074;
        ping.lon = -181.0;
        assert!(!ping.is_valid());
    }
}
