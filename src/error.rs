//! Error classification for the audit pipeline.
//!
//! The propagation rule (see the error handling design) only lets
//! configuration, connection, and writer errors abort a run. Metadata errors
//! are fatal for a single table; measurement and sample-collection errors are
//! swallowed at the call site and surfaced as empty/partial fields instead.
//! This enum exists so the runner can apply that rule by matching on kind
//! rather than sniffing error message text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Unparseable regex, missing source URL, unknown config key. Fatal before any work starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Could not open or authenticate a connection to a source. Fatal for that source only.
    #[error("connection error ({source_name}): {message}")]
    Connection { source_name: String, message: String },

    /// Could not enumerate tables/columns for a table. Fatal for that table only.
    #[error("metadata error for {schema}.{table}: {message}")]
    Metadata {
        schema: String,
        table: String,
        message: String,
    },

    /// A single key-combination or FD query failed. Logged and skipped.
    #[error("measurement error: {0}")]
    Measurement(String),

    /// An evidence-collection query for an FD failed. Logged; the FD is still emitted.
    #[error("sample-collection error: {0}")]
    SampleCollection(String),

    /// Writing an artifact to disk failed. Fatal for the run.
    #[error("writer error: {0}")]
    Writer(String),
}

impl From<std::io::Error> for AuditError {
    fn from(e: std::io::Error) -> Self {
        AuditError::Writer(e.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Writer(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
