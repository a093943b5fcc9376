//! Whole-operation error type for imports
//!
//! Per-file failures (unparseable records, per-file catalog errors) are not
//! represented here; they are collected into the returned summary so one bad
//! file never aborts an import. These variants end the whole operation.

use crate::services::file_scanner::ScanError;
use thiserror::Error;

/// Errors that abort an entire import operation
#[derive(Debug, Error)]
pub enum ImportError {
    /// The confirmation callback declined the operation. No side effects
    /// have been performed.
    #[error("Import declined by confirmation policy")]
    Aborted,

    /// A requested root directory could not be scanned
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// A parse worker task failed to join
    #[error("Worker task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
