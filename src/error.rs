//! Errors surfaced by iterator construction and iteration.
//!
//! `Config` is fatal at construction. `Connection` and `Query` are fatal for
//! one input URI only. Everything else is reported for a single row.

use thiserror::Error;

/// Boxed error carried from a collaborator (driver, filter).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The iterator URI could not be turned into an iterator.
    #[error("invalid iterator URI '{uri}': {reason}")]
    Config { uri: String, reason: String },

    /// The database behind one input URI could not be opened.
    #[error("failed to open {engine} database '{uri}': {source}")]
    Connection {
        engine: String,
        uri: String,
        #[source]
        source: BoxError,
    },

    /// The documents query failed, or the cursor broke while scanning.
    #[error("failed to query 'geojson' table with '{uri}': {source}")]
    Query {
        uri: String,
        #[source]
        source: BoxError,
    },

    /// A single row could not be read from the cursor.
    #[error("failed to scan row with '{uri}': {source}")]
    RowScan {
        uri: String,
        #[source]
        source: BoxError,
    },

    /// The record body could not be rewound after filtering.
    #[error("failed to rewind body for record '{id}' with '{uri}': {source}")]
    Stream {
        id: i64,
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// The filter failed while evaluating a record.
    #[error("failed to apply query filters to record '{id}' with '{uri}': {source}")]
    Filter {
        id: i64,
        uri: String,
        #[source]
        source: BoxError,
    },

    /// A row worker panicked before reporting.
    #[error("row worker for '{uri}' did not complete: {reason}")]
    Task { uri: String, reason: String },
}

impl Error {
    pub(crate) fn config(uri: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the error ends iteration of its input URI.
    pub fn is_fatal_for_uri(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Query { .. })
    }
}
