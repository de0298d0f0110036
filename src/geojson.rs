//! GeoJSON views: the live snapshot and the full-history export.
//!
//! The snapshot is a single-feature FeatureCollection for the most recent
//! ping's cell and is overwritten wholesale on every live ping. It is a
//! "where is the device now" file, not a feed. The export is the only view
//! that reflects the complete store: one feature per location, carrying the
//! whole date -> times history in its properties.

use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;
use serde_json::{json, Value};

use crate::history::HistoryStore;
use crate::{Error, Result};

#[derive(Debug, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: Geometry,
    pub properties: Value,
}

#[derive(Debug, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[lon, lat]` per the GeoJSON spec.
    pub coordinates: [f64; 2],
}

fn point_feature(lon: f64, lat: f64, properties: Value) -> Feature {
    Feature {
        kind: "Feature",
        geometry: Geometry {
            kind: "Point",
            coordinates: [lon, lat],
        },
        properties,
    }
}

fn write_collection(collection: &FeatureCollection, path: &Path) -> Result<()> {
    let json = serde_json::to_string(collection).map_err(|source| Error::Encode {
        what: "geojson",
        source,
    })?;
    fs::write(path, json).map_err(|source| Error::ViewWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Overwrite the snapshot with a single feature for the given cell.
pub fn write_snapshot(lon: f64, lat: f64, popup: &str, path: &Path) -> Result<()> {
    let collection = FeatureCollection {
        kind: "FeatureCollection",
        features: vec![point_feature(lon, lat, json!({ "popupContent": popup }))],
    };
    write_collection(&collection, path)
}

/// Dump every location with its complete date -> times history.
pub fn export_history(store: &HistoryStore, path: &Path) -> Result<()> {
    let precision = store.precision();
    let mut features = Vec::with_capacity(store.len());
    for (key, days) in store.iter() {
        let properties = serde_json::to_value(days).map_err(|source| Error::Encode {
            what: "history properties",
            source,
        })?;
        features.push(point_feature(key.lon(precision), key.lat(precision), properties));
    }

    let collection = FeatureCollection {
        kind: "FeatureCollection",
        features,
    };
    write_collection(&collection, path)?;
    info!(
        "exported {} locations to {}",
        store.len(),
        path.display()
    );
    Ok(())
}
