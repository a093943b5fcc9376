//! Domain models for the hierarchy catalog
//!
//! Each entity is identified by its DICOM-assigned business key (patient ID
//! or instance UID), not by a storage-assigned surrogate. A study always
//! belongs to exactly one patient, a series to one study, an instance to one
//! series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How the catalog holds on to an instance's bytes.
///
/// The mode is fixed when the instance row is first inserted; re-importing
/// the same SOP instance never changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Catalog stores only a reference to the source file's location.
    /// The file must remain reachable for later use.
    Linked,
    /// The managed store owns a private copy of the file content,
    /// duplicated at import time.
    Copied,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Linked => "linked",
            StorageMode::Copied => "copied",
        }
    }

    /// Parse the database representation. Unknown values fall back to
    /// `Linked`, the conservative reading (the source path is still there).
    pub fn from_db(s: &str) -> Self {
        match s {
            "copied" => StorageMode::Copied,
            _ => StorageMode::Linked,
        }
    }
}

/// Patient record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    /// DICOM PatientID (0010,0020)
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Study record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    /// DICOM StudyInstanceUID (0020,000D)
    pub study_instance_uid: String,
    pub patient_id: String,
    pub study_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub accession_number: Option<String>,
}

/// Series record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    /// DICOM SeriesInstanceUID (0020,000E)
    pub series_instance_uid: String,
    pub study_instance_uid: String,
    pub modality: Option<String>,
    pub series_number: Option<i64>,
    pub description: Option<String>,
}

/// Instance record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// DICOM SOPInstanceUID (0008,0018)
    pub sop_instance_uid: String,
    pub series_instance_uid: String,
    /// Source path for `Linked` instances, managed-store path for `Copied`.
    pub file_path: String,
    pub storage_mode: StorageMode,
    pub file_size: i64,
    pub sop_class_uid: Option<String>,
    pub instance_number: Option<i64>,
}
