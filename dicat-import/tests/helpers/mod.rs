//! Shared test helpers: DICOM fixture generation and store setup
#![allow(dead_code)]

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicat_import::services::import_coordinator::ImportCoordinator;
use sqlx::SqlitePool;
use std::path::Path;

/// Secondary Capture Image Storage
pub const SOP_CLASS_SECONDARY_CAPTURE: &str = "1.2.840.10008.5.1.4.1.1.7";

/// One synthetic DICOM instance. Optional fields are written only when set,
/// so tests can produce records with missing attributes.
#[derive(Debug, Clone)]
pub struct TestInstance {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub patient_birth_date: Option<String>,
    pub study_uid: Option<String>,
    pub study_date: Option<String>,
    pub study_description: Option<String>,
    pub accession_number: Option<String>,
    pub series_uid: Option<String>,
    pub modality: Option<String>,
    pub series_number: Option<String>,
    pub series_description: Option<String>,
    pub sop_uid: String,
    pub sop_class_uid: String,
    pub instance_number: Option<String>,
    /// Write the SOPInstanceUID element into the data set (file meta always
    /// carries it). Disabled by missing-field tests.
    pub sop_uid_in_dataset: bool,
}

impl TestInstance {
    /// A fully-populated instance with the given hierarchy keys.
    pub fn new(patient_id: &str, study_uid: &str, series_uid: &str, sop_uid: &str) -> Self {
        Self {
            patient_id: Some(patient_id.to_string()),
            patient_name: Some("Doe^Jane".to_string()),
            patient_birth_date: Some("19701224".to_string()),
            study_uid: Some(study_uid.to_string()),
            study_date: Some("20240105".to_string()),
            study_description: Some("CT CHEST".to_string()),
            accession_number: Some("ACC42".to_string()),
            series_uid: Some(series_uid.to_string()),
            modality: Some("CT".to_string()),
            series_number: Some("3".to_string()),
            series_description: Some("Axial".to_string()),
            sop_uid: sop_uid.to_string(),
            sop_class_uid: SOP_CLASS_SECONDARY_CAPTURE.to_string(),
            instance_number: Some("1".to_string()),
            sop_uid_in_dataset: true,
        }
    }

    /// Write the instance as a part-10 file (explicit VR little endian).
    pub fn write_to(&self, path: &Path) {
        let mut obj = InMemDicomObject::new_empty();

        put_opt(&mut obj, tags::PATIENT_ID, VR::LO, &self.patient_id);
        put_opt(&mut obj, tags::PATIENT_NAME, VR::PN, &self.patient_name);
        put_opt(&mut obj, tags::PATIENT_BIRTH_DATE, VR::DA, &self.patient_birth_date);
        put_opt(&mut obj, tags::STUDY_INSTANCE_UID, VR::UI, &self.study_uid);
        put_opt(&mut obj, tags::STUDY_DATE, VR::DA, &self.study_date);
        put_opt(&mut obj, tags::STUDY_DESCRIPTION, VR::LO, &self.study_description);
        put_opt(&mut obj, tags::ACCESSION_NUMBER, VR::SH, &self.accession_number);
        put_opt(&mut obj, tags::SERIES_INSTANCE_UID, VR::UI, &self.series_uid);
        put_opt(&mut obj, tags::MODALITY, VR::CS, &self.modality);
        put_opt(&mut obj, tags::SERIES_NUMBER, VR::IS, &self.series_number);
        put_opt(&mut obj, tags::SERIES_DESCRIPTION, VR::LO, &self.series_description);
        put_opt(&mut obj, tags::INSTANCE_NUMBER, VR::IS, &self.instance_number);
        obj.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(self.sop_class_uid.as_str()),
        ));
        if self.sop_uid_in_dataset {
            obj.put(DataElement::new(
                tags::SOP_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(self.sop_uid.as_str()),
            ));
        }

        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(self.sop_class_uid.as_str())
            .media_storage_sop_instance_uid(self.sop_uid.as_str())
            .transfer_syntax("1.2.840.10008.1.2.1");

        let file_obj = obj.with_meta(meta).expect("Failed to build file meta");
        file_obj.write_to_file(path).expect("Failed to write fixture");
    }
}

fn put_opt(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: &Option<String>) {
    if let Some(value) = value {
        obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value.as_str())));
    }
}

/// Write a fully-populated instance with the given hierarchy keys.
pub fn write_instance(path: &Path, patient_id: &str, study_uid: &str, series_uid: &str, sop_uid: &str) {
    TestInstance::new(patient_id, study_uid, series_uid, sop_uid).write_to(path);
}

/// A file the scanner accepts (DICM magic) but the parser rejects.
pub fn write_corrupt_dicom(path: &Path) {
    let mut bytes = vec![0u8; 128];
    bytes.extend_from_slice(b"DICM");
    bytes.extend_from_slice(b"this is not a valid data set");
    std::fs::write(path, bytes).expect("Failed to write corrupt fixture");
}

/// Open fresh catalog + tag cache stores under `dir`.
pub async fn open_stores(dir: &Path) -> (SqlitePool, SqlitePool) {
    dicat_common::db::init::open_stores(dir)
        .await
        .expect("Failed to open test stores")
}

/// Coordinator over the given stores with its managed storage under `dir`.
pub fn coordinator(db: SqlitePool, tag_db: SqlitePool, dir: &Path) -> ImportCoordinator {
    ImportCoordinator::new(db, tag_db, dir.join("storage")).with_parse_workers(2)
}
