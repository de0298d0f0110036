//! End-to-end pipeline tests: live pings and bulk import driven through a
//! tracker against real files in a temp directory, including the restart
//! path (persist, reopen, keep going).

use std::fs;
use std::io::Cursor;

use tempfile::TempDir;
use whereabouts::{HistoryStore, Ping, TimezoneMode, Tracker, TrackerPaths};

/// Helper: tracker with all output files inside a temp dir.
fn tracker_in(dir: &TempDir) -> Tracker {
    let paths = TrackerPaths {
        store: dir.path().join("history.json"),
        heatmap: dir.path().join("map.js"),
        snapshot: dir.path().join("realtime.geojson"),
    };
    Tracker::open(paths, 4, TimezoneMode::Utc, 5).expect("failed to open tracker")
}

fn ping(lat: f64, lon: f64, tst: i64) -> Ping {
    Ping {
        lat,
        lon,
        tst,
        tid: "px".to_string(),
    }
}

#[test]
fn live_ping_writes_store_and_both_views() {
    let dir = TempDir::new().unwrap();
    let mut tracker = tracker_in(&dir);

    tracker.handle_ping(&ping(51.5074, -0.1278, 1_700_000_000)).unwrap();

    assert!(dir.path().join("history.json").exists());
    assert!(dir.path().join("map.js").exists());
    assert!(dir.path().join("realtime.geojson").exists());

    // The persisted store already reflects the ping.
    let store = HistoryStore::load(&dir.path().join("history.json"), 4, TimezoneMode::Utc).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.total_pings(), 1);
}

#[test]
fn snapshot_reflects_only_the_latest_ping() {
    let dir = TempDir::new().unwrap();
    let mut tracker = tracker_in(&dir);

    tracker.handle_ping(&ping(51.5074, -0.1278, 1_700_000_000)).unwrap();
    tracker.handle_ping(&ping(40.0, -74.0, 1_700_000_060)).unwrap();

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("realtime.geojson")).unwrap())
            .unwrap();
    let features = doc["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["geometry"]["coordinates"][0], -74.0);
    assert_eq!(features[0]["geometry"]["coordinates"][1], 40.0);
    assert_eq!(
        features[0]["properties"]["popupContent"],
        "Device: px<br>Date: 2023-11-14<br>Time: 22-14-20"
    );
}

#[test]
fn restart_preserves_history() {
    let dir = TempDir::new().unwrap();

    let mut tracker = tracker_in(&dir);
    tracker.handle_ping(&ping(51.5074, -0.1278, 1_700_000_000)).unwrap();
    tracker.handle_ping(&ping(40.0, -74.0, 1_700_000_060)).unwrap();
    drop(tracker);

    let mut tracker = tracker_in(&dir);
    assert_eq!(tracker.store().len(), 2);
    assert_eq!(tracker.store().total_pings(), 2);

    tracker.handle_ping(&ping(51.5074, -0.1278, 1_700_000_120)).unwrap();
    assert_eq!(tracker.store().len(), 2);
    assert_eq!(tracker.store().total_pings(), 3);
}

#[test]
fn malformed_ping_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let mut tracker = tracker_in(&dir);

    assert!(tracker.handle_ping(&ping(200.0, 0.0, 1_700_000_000)).is_err());

    assert_eq!(tracker.store().len(), 0);
    assert!(!dir.path().join("history.json").exists());
    assert!(!dir.path().join("map.js").exists());
}

#[test]
fn import_persists_once_and_skips_the_snapshot() {
    let archive = r#"{
        "locations": [
            {"timestampMs": "1700000000000", "latitudeE7": 371234100, "longitudeE7": -1225432100},
            {"timestampMs": "1700000060000", "latitudeE7": 371234300, "longitudeE7": -1225432300},
            {"timestampMs": "1700000120000", "latitudeE7": 400000000, "longitudeE7": -740000000}
        ]
    }"#;

    let dir = TempDir::new().unwrap();
    let mut tracker = tracker_in(&dir);

    let count = tracker.import_archive(Cursor::new(archive)).unwrap();
    assert_eq!(count, 3);
    assert_eq!(tracker.store().len(), 2);

    // Store and heatmap land on disk; the snapshot still means "most
    // recent live ping" and is not created by an import.
    assert!(dir.path().join("history.json").exists());
    assert!(dir.path().join("map.js").exists());
    assert!(!dir.path().join("realtime.geojson").exists());

    let heatmap = fs::read_to_string(dir.path().join("map.js")).unwrap();
    assert_eq!(
        heatmap,
        "var points = [[37.1234,-122.5432,2],[40,-74,1]];config = {radius: 11.132,blur:5};"
    );
}

#[test]
fn corrupt_store_fails_to_open() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("history.json"), b"{ definitely not a store").unwrap();

    let paths = TrackerPaths {
        store: dir.path().join("history.json"),
        heatmap: dir.path().join("map.js"),
        snapshot: dir.path().join("realtime.geojson"),
    };
    assert!(Tracker::open(paths, 4, TimezoneMode::Utc, 5).is_err());
}

#[test]
fn heatmap_regeneration_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut tracker = tracker_in(&dir);

    tracker.handle_ping(&ping(51.5074, -0.1278, 1_700_000_000)).unwrap();
    let first = fs::read(dir.path().join("map.js")).unwrap();

    whereabouts::heatmap::write(tracker.store(), 5, &dir.path().join("map.js")).unwrap();
    let second = fs::read(dir.path().join("map.js")).unwrap();

    assert_eq!(first, second);
}
