//! Unified error handling.
//!
//! A single error type covers the whole pipeline; adapters translate it at
//! their boundary (HTTP status in the server, exit code in the CLI). Only a
//! malformed individual ping is survivable; everything else is fatal for
//! the operation that triggered it.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for whereabouts operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A single ping with missing fields or out-of-range values. The
    /// ingestion path rejects the ping and keeps serving.
    #[error("malformed ping: {reason}")]
    MalformedPing { reason: String },

    /// Timestamp outside the representable range.
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),

    /// The store file exists but could not be read.
    #[error("failed to read history store {}", path.display())]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but does not parse. Fatal at startup: better
    /// to stop than to serve with history silently missing.
    #[error("history store {} is corrupt", path.display())]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing the store (or its temp file) failed.
    #[error("failed to persist history store to {}", path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a derived view file failed.
    #[error("failed to write {}", path.display())]
    ViewWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing an output document failed.
    #[error("failed to encode {what}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The import archive could not be opened.
    #[error("failed to open archive {}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The import archive could not be decoded. Aborts the whole import.
    #[error("failed to read location archive")]
    ArchiveRead(#[source] serde_json::Error),

    /// A record inside the archive carried an unusable value.
    #[error("invalid archive record: {reason}")]
    ArchiveRecord { reason: String },

    /// The listener could not bind its address.
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The listener died while serving.
    #[error("server error")]
    Serve(#[source] std::io::Error),
}
