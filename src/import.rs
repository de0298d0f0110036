//! Bulk import of a Google location-history archive.
//!
//! The archive is one large JSON document with a `locations` array of
//! records in E7 fixed-point degrees. The array can be far bigger than
//! memory, so the document is decoded with a streaming visitor that hands
//! each record to a sink as it is parsed and never buffers the input.
//!
//! Import bypasses per-record persistence: the caller persists the store
//! once after the stream is exhausted. A malformed archive aborts the
//! whole import; there are no partial-commit semantics.

use std::fmt;
use std::io::{BufReader, Read};

use log::info;
use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::history::HistoryStore;
use crate::{Error, Result};

/// One record from the archive's `locations` array. Unknown fields
/// (accuracy, activity classifications, ...) are skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveRecord {
    #[serde(rename = "latitudeE7")]
    pub latitude_e7: i64,
    #[serde(rename = "longitudeE7")]
    pub longitude_e7: i64,
    /// Milliseconds since the epoch, as a decimal string.
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: String,
}

impl ArchiveRecord {
    pub fn latitude(&self) -> f64 {
        self.latitude_e7 as f64 / 1e7
    }

    pub fn longitude(&self) -> f64 {
        self.longitude_e7 as f64 / 1e7
    }

    /// Unix seconds: the millisecond string with its last three digits
    /// dropped.
    pub fn timestamp(&self) -> Result<i64> {
        let ms = &self.timestamp_ms;
        let secs = ms
            .len()
            .checked_sub(3)
            .and_then(|end| ms.get(..end))
            .unwrap_or("");
        secs.parse().map_err(|_| Error::ArchiveRecord {
            reason: format!("bad timestampMs {ms:?}"),
        })
    }
}

/// Stream the `locations` array out of `reader`, invoking `sink` for each
/// record. Returns the number of records decoded.
pub fn stream_archive<R, F>(reader: R, sink: F) -> Result<u64>
where
    R: Read,
    F: FnMut(ArchiveRecord) -> Result<()>,
{
    let mut de = serde_json::Deserializer::from_reader(BufReader::new(reader));
    DocumentSeed { sink }
        .deserialize(&mut de)
        .map_err(Error::ArchiveRead)
}

/// Quantize, bucket and record every archive record, with no per-record
/// persistence. The caller persists once afterwards.
pub fn import_archive<R: Read>(store: &mut HistoryStore, reader: R) -> Result<u64> {
    let count = stream_archive(reader, |record| {
        let key = store.quantize(record.latitude(), record.longitude());
        let (date, time) = store.bucket(record.timestamp()?)?;
        store.record(key, &date, &time);
        Ok(())
    })?;
    info!(
        "{} records imported, history size {} locations",
        count,
        store.len()
    );
    Ok(count)
}

// ============================================================================
// Streaming decoder
// ============================================================================

struct DocumentSeed<F> {
    sink: F,
}

impl<'de, F> DeserializeSeed<'de> for DocumentSeed<F>
where
    F: FnMut(ArchiveRecord) -> Result<()>,
{
    type Value = u64;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for DocumentSeed<F>
where
    F: FnMut(ArchiveRecord) -> Result<()>,
{
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a location history document")
    }

    fn visit_map<A>(mut self, mut map: A) -> std::result::Result<u64, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut count = 0;
        while let Some(field) = map.next_key::<String>()? {
            if field == "locations" {
                count = map.next_value_seed(LocationsSeed {
                    sink: &mut self.sink,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(count)
    }
}

struct LocationsSeed<'a, F> {
    sink: &'a mut F,
}

impl<'de, 'a, F> DeserializeSeed<'de> for LocationsSeed<'a, F>
where
    F: FnMut(ArchiveRecord) -> Result<()>,
{
    type Value = u64;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'a, F> Visitor<'de> for LocationsSeed<'a, F>
where
    F: FnMut(ArchiveRecord) -> Result<()>,
{
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of location records")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<u64, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut count = 0u64;
        while let Some(record) = seq.next_element::<ArchiveRecord>()? {
            (self.sink)(record).map_err(serde::de::Error::custom)?;
            count += 1;
        }
        Ok(count)
    }
}
