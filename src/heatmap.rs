//! Heatmap-weight dataset generation.
//!
//! Emits the script-embeddable dataset the map front end loads directly:
//! an array literal of `[lat, lon, weight]` triples followed by a display
//! configuration object. The textual shape is a fixed, versionless contract
//! with the front end:
//!
//! ```text
//! var points = [[51.5074,-0.1278,3],...];config = {radius: 11.132,blur:5};
//! ```
//!
//! The dataset is regenerated in full on every call (no incremental
//! diffing) and is deterministic: an unchanged store renders to identical
//! bytes.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::debug;

use crate::history::HistoryStore;
use crate::{Error, Result};

/// Default blur constant handed through to the renderer.
pub const DEFAULT_BLUR: u32 = 5;

/// Display radius in meters for one rounding cell: meters per degree at
/// the equator divided by the cell size. An approximation (a degree of
/// longitude shrinks away from the equator) but good enough for a point
/// radius.
pub fn radius_meters(precision: u8) -> f64 {
    111_320.0 / 10f64.powi(i32::from(precision))
}

/// Render the dataset for the store's current state.
///
/// Weight is the total ping count ever recorded at a location, summed
/// across all of its dates.
pub fn render(store: &HistoryStore, blur: u32) -> String {
    let precision = store.precision();
    let mut out = String::from("var points = [");
    let mut first = true;
    for (key, days) in store.iter() {
        let weight: usize = days.values().map(Vec::len).sum();
        if !first {
            out.push(',');
        }
        first = false;
        let _ = write!(
            out,
            "[{},{},{}]",
            key.lat(precision),
            key.lon(precision),
            weight
        );
    }
    out.push_str("];");
    let _ = write!(
        out,
        "config = {{radius: {},blur:{}}};",
        radius_meters(precision),
        blur
    );
    out
}

/// Regenerate the dataset file in full.
pub fn write(store: &HistoryStore, blur: u32, path: &Path) -> Result<()> {
    debug!("regenerating heatmap dataset at {}", path.display());
    fs::write(path, render(store, blur)).map_err(|source| Error::ViewWrite {
        path: path.to_path_buf(),
        source,
    })
}
