//! Error taxonomy shared by the catalog, scanner and thumbnail engine.
//!
//! Whole-operation failures (`ScanError`, `CatalogError`) abort a call.
//! Per-file and per-id problems (`FileIssue`, `GenerationError`) are
//! collected into reports and never raised on their own.

use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("media id not found: {0}")]
    NotFound(String),

    #[error("record {id} changed size (catalog={expected}, thumbnail source={actual})")]
    Stale { id: String, expected: u64, actual: u64 },

    #[error("catalog query failed: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("catalog connection pool failed: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("catalog storage unavailable: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan root unavailable: {}: {reason}", path.display())]
    RootUnavailable { path: PathBuf, reason: String },

    #[error("a scan overlapping {} is already running", .0.display())]
    ScanInProgress(PathBuf),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Failures while bringing the application state up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("data directory unavailable: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal problem with one entry encountered while walking a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileIssue {
    #[error("file unreadable: {path}: {reason}")]
    FileUnreadable { path: String, reason: String },
}

/// Why a single thumbnail job did not produce a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GenerationError {
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("media id not found")]
    NotFound,

    #[error("source unreadable: {0}")]
    FileUnreadable(String),

    #[error("thumbnail write failed: {0}")]
    Write(String),

    #[error("source changed since last scan: {0}")]
    Stale(String),

    #[error("catalog update failed: {0}")]
    Catalog(String),

    #[error("thumbnail job aborted before finishing")]
    Aborted,
}

impl From<CatalogError> for GenerationError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::NotFound(_) => GenerationError::NotFound,
            stale @ CatalogError::Stale { .. } => GenerationError::Stale(stale.to_string()),
            other => GenerationError::Catalog(other.to_string()),
        }
    }
}
