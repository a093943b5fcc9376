//! Import operation results and per-file errors
//!
//! An import call returns a plain value summarizing what it did: how many
//! hierarchy nodes of each level were newly added by this operation, how
//! many files were processed or skipped, and the reasons for every skip.
//! Counters are reset at the start of each call; catalog totals are obtained
//! separately through the catalog enumeration accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One skipped file and why it was skipped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFileError {
    /// File path that caused the error
    pub file_path: String,

    /// Error code (e.g., "NOT_DICOM", "MISSING_FIELD", "CATALOG_ERROR")
    pub error_code: String,

    /// Human-readable error message
    pub error_message: String,

    /// When the error occurred
    pub occurred_at: DateTime<Utc>,
}

impl ImportFileError {
    pub fn new(file_path: String, error_code: &str, error_message: String) -> Self {
        Self {
            file_path,
            error_code: error_code.to_string(),
            error_message,
            occurred_at: Utc::now(),
        }
    }
}

/// Import completion result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Patients newly added by this operation
    pub patients_added: usize,

    /// Studies newly added by this operation
    pub studies_added: usize,

    /// Series newly added by this operation
    pub series_added: usize,

    /// Instances newly added by this operation
    pub instances_added: usize,

    /// Files parsed and indexed (including already-present instances)
    pub files_processed: usize,

    /// Files skipped due to errors
    pub files_skipped: usize,

    /// Per-file errors for every skipped file
    pub errors: Vec<ImportFileError>,
}

impl ImportSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four added-counters as a tuple, in hierarchy order.
    pub fn added(&self) -> (usize, usize, usize, usize) {
        (
            self.patients_added,
            self.studies_added,
            self.series_added,
            self.instances_added,
        )
    }

    /// Fold another summary into this one (used when one CLI invocation
    /// imports both explicit files and directories).
    pub fn merge(&mut self, other: ImportSummary) {
        self.patients_added += other.patients_added;
        self.studies_added += other.studies_added;
        self.series_added += other.series_added;
        self.instances_added += other.instances_added;
        self.files_processed += other.files_processed;
        self.files_skipped += other.files_skipped;
        self.errors.extend(other.errors);
    }
}
