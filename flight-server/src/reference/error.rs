//! Reference data error types.

use std::path::PathBuf;

/// Errors that can occur when loading or querying reference data.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication failed
    #[error("unauthorized: check REFERENCE_API_KEY")]
    Unauthorized,

    /// API returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    #[error("reference file {}: {source}", path.display())]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed reference file {}: {source}", path.display())]
    SnapshotFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No upstream configured for a refresh
    #[error("reference source not configured")]
    NotConfigured,

    /// Lookup backend failed
    #[error("reference lookup failed: {0}")]
    Lookup(String),
}
