//! DICOM metadata extraction service
//!
//! Reads one file and extracts the four hierarchy keys (PatientID,
//! StudyInstanceUID, SeriesInstanceUID, SOPInstanceUID) plus the
//! descriptive fields the catalog and tag cache carry. Pure function of the
//! file's bytes; no side effects.

use chrono::NaiveDate;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use std::path::Path;
use thiserror::Error;

/// DICOM attribute tags in "GGGG,EEEE" form, used as tag cache keys.
pub mod tag_keys {
    pub const PATIENT_NAME: &str = "0010,0010";
    pub const PATIENT_ID: &str = "0010,0020";
    pub const PATIENT_BIRTH_DATE: &str = "0010,0030";
    pub const STUDY_DATE: &str = "0008,0020";
    pub const ACCESSION_NUMBER: &str = "0008,0050";
    pub const MODALITY: &str = "0008,0060";
    pub const STUDY_DESCRIPTION: &str = "0008,1030";
    pub const SERIES_DESCRIPTION: &str = "0008,103E";
    pub const SOP_CLASS_UID: &str = "0008,0016";
    pub const STUDY_INSTANCE_UID: &str = "0020,000D";
    pub const SERIES_INSTANCE_UID: &str = "0020,000E";
    pub const SERIES_NUMBER: &str = "0020,0011";
    pub const INSTANCE_NUMBER: &str = "0020,0013";
}

/// Metadata extraction errors, all recoverable at the caller: the offending
/// file is skipped and counted, the import continues.
#[derive(Debug, Error)]
pub enum ParseError {
    /// File unreadable
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not match the DICOM part-10 layout
    #[error("Not a DICOM record: {0}")]
    NotARecord(String),

    /// Valid DICOM but a mandatory identifying field is absent
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),
}

/// Identifying and descriptive metadata extracted from one record
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    // Hierarchy keys, all mandatory
    pub patient_id: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,

    // Descriptive fields
    pub patient_name: Option<String>,
    pub patient_birth_date: Option<NaiveDate>,
    pub study_date: Option<NaiveDate>,
    pub study_description: Option<String>,
    pub accession_number: Option<String>,
    pub modality: Option<String>,
    pub series_number: Option<i64>,
    pub series_description: Option<String>,
    pub sop_class_uid: Option<String>,
    pub instance_number: Option<i64>,

    /// Raw byte length of the source file
    pub file_size: u64,
}

impl RecordMetadata {
    /// The tag cache entries this record contributes: every descriptive
    /// field that was actually present, keyed by its DICOM tag string.
    pub fn cache_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();

        entries.push((tag_keys::PATIENT_ID, self.patient_id.clone()));
        entries.push((tag_keys::STUDY_INSTANCE_UID, self.study_instance_uid.clone()));
        entries.push((tag_keys::SERIES_INSTANCE_UID, self.series_instance_uid.clone()));

        if let Some(v) = &self.patient_name {
            entries.push((tag_keys::PATIENT_NAME, v.clone()));
        }
        if let Some(d) = self.patient_birth_date {
            entries.push((tag_keys::PATIENT_BIRTH_DATE, d.to_string()));
        }
        if let Some(d) = self.study_date {
            entries.push((tag_keys::STUDY_DATE, d.to_string()));
        }
        if let Some(v) = &self.study_description {
            entries.push((tag_keys::STUDY_DESCRIPTION, v.clone()));
        }
        if let Some(v) = &self.accession_number {
            entries.push((tag_keys::ACCESSION_NUMBER, v.clone()));
        }
        if let Some(v) = &self.modality {
            entries.push((tag_keys::MODALITY, v.clone()));
        }
        if let Some(n) = self.series_number {
            entries.push((tag_keys::SERIES_NUMBER, n.to_string()));
        }
        if let Some(v) = &self.series_description {
            entries.push((tag_keys::SERIES_DESCRIPTION, v.clone()));
        }
        if let Some(v) = &self.sop_class_uid {
            entries.push((tag_keys::SOP_CLASS_UID, v.clone()));
        }
        if let Some(n) = self.instance_number {
            entries.push((tag_keys::INSTANCE_NUMBER, n.to_string()));
        }

        entries
    }
}

/// Metadata extractor service
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract identifying metadata from a DICOM file
    pub fn extract(&self, file_path: &Path) -> Result<RecordMetadata, ParseError> {
        // Readability check first, so a vanished or unreadable file surfaces
        // as Io rather than NotARecord
        let file_size = std::fs::metadata(file_path)?.len();

        let obj = open_file(file_path).map_err(|e| ParseError::NotARecord(e.to_string()))?;

        let patient_id = string_value(&obj, tags::PATIENT_ID)
            .ok_or(ParseError::MissingRequiredField("PatientID"))?;
        let study_instance_uid = string_value(&obj, tags::STUDY_INSTANCE_UID)
            .ok_or(ParseError::MissingRequiredField("StudyInstanceUID"))?;
        let series_instance_uid = string_value(&obj, tags::SERIES_INSTANCE_UID)
            .ok_or(ParseError::MissingRequiredField("SeriesInstanceUID"))?;
        let sop_instance_uid = string_value(&obj, tags::SOP_INSTANCE_UID)
            .ok_or(ParseError::MissingRequiredField("SOPInstanceUID"))?;

        Ok(RecordMetadata {
            patient_id,
            study_instance_uid,
            series_instance_uid,
            sop_instance_uid,
            patient_name: string_value(&obj, tags::PATIENT_NAME),
            patient_birth_date: date_value(&obj, tags::PATIENT_BIRTH_DATE),
            study_date: date_value(&obj, tags::STUDY_DATE),
            study_description: string_value(&obj, tags::STUDY_DESCRIPTION),
            accession_number: string_value(&obj, tags::ACCESSION_NUMBER),
            modality: string_value(&obj, tags::MODALITY),
            series_number: int_value(&obj, tags::SERIES_NUMBER),
            series_description: string_value(&obj, tags::SERIES_DESCRIPTION),
            sop_class_uid: string_value(&obj, tags::SOP_CLASS_UID),
            instance_number: int_value(&obj, tags::INSTANCE_NUMBER),
            file_size,
        })
    }
}

/// Read an element as a trimmed string; absent, empty, or unconvertible
/// elements become `None`.
fn string_value(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    let element = obj.element_opt(tag).ok().flatten()?;
    let value = element.to_str().ok()?;
    // DICOM string values may be padded with trailing spaces or NULs
    let trimmed = value.trim_end_matches(['\u{0}', ' ']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Read an integer-string element (IS VR).
fn int_value(obj: &DefaultDicomObject, tag: Tag) -> Option<i64> {
    let element = obj.element_opt(tag).ok().flatten()?;
    element.to_int::<i64>().ok()
}

/// Read a DA element ("YYYYMMDD") as a date.
fn date_value(obj: &DefaultDicomObject, tag: Tag) -> Option<NaiveDate> {
    let raw = string_value(obj, tag)?;
    NaiveDate::parse_from_str(&raw, "%Y%m%d").ok()
}
