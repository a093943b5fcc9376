//! Metadata extractor tests against real part-10 files on disk

mod helpers;

use chrono::NaiveDate;
use dicat_import::services::metadata_extractor::ParseError;
use dicat_import::services::MetadataExtractor;
use tempfile::TempDir;

#[test]
fn test_extract_full_record() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("full.dcm");
    helpers::write_instance(&path, "PAT001", "1.2.3", "1.2.3.4", "1.2.3.4.5");

    let meta = MetadataExtractor::new().extract(&path).unwrap();

    assert_eq!(meta.patient_id, "PAT001");
    assert_eq!(meta.study_instance_uid, "1.2.3");
    assert_eq!(meta.series_instance_uid, "1.2.3.4");
    assert_eq!(meta.sop_instance_uid, "1.2.3.4.5");

    assert_eq!(meta.patient_name.as_deref(), Some("Doe^Jane"));
    assert_eq!(
        meta.patient_birth_date,
        Some(NaiveDate::from_ymd_opt(1970, 12, 24).unwrap())
    );
    assert_eq!(
        meta.study_date,
        Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
    );
    assert_eq!(meta.study_description.as_deref(), Some("CT CHEST"));
    assert_eq!(meta.accession_number.as_deref(), Some("ACC42"));
    assert_eq!(meta.modality.as_deref(), Some("CT"));
    assert_eq!(meta.series_number, Some(3));
    assert_eq!(meta.series_description.as_deref(), Some("Axial"));
    assert_eq!(
        meta.sop_class_uid.as_deref(),
        Some(helpers::SOP_CLASS_SECONDARY_CAPTURE)
    );
    assert_eq!(meta.instance_number, Some(1));

    let on_disk = std::fs::metadata(&path).unwrap().len();
    assert_eq!(meta.file_size, on_disk);
}

#[test]
fn test_extract_minimal_record() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("minimal.dcm");
    let mut fixture = helpers::TestInstance::new("PAT001", "1.2.3", "1.2.3.4", "1.2.3.4.5");
    fixture.patient_name = None;
    fixture.patient_birth_date = None;
    fixture.study_date = None;
    fixture.study_description = None;
    fixture.accession_number = None;
    fixture.modality = None;
    fixture.series_number = None;
    fixture.series_description = None;
    fixture.instance_number = None;
    fixture.write_to(&path);

    let meta = MetadataExtractor::new().extract(&path).unwrap();

    assert_eq!(meta.patient_id, "PAT001");
    assert_eq!(meta.patient_name, None);
    assert_eq!(meta.study_date, None);
    assert_eq!(meta.modality, None);
    assert_eq!(meta.series_number, None);
    assert_eq!(meta.instance_number, None);
}

#[test]
fn test_extract_rejects_non_dicom_bytes() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("junk.dcm");
    helpers::write_corrupt_dicom(&path);

    let err = MetadataExtractor::new().extract(&path).unwrap_err();
    assert!(matches!(err, ParseError::NotARecord(_)));
}

#[test]
fn test_extract_nonexistent_path_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = MetadataExtractor::new()
        .extract(&tmp.path().join("does-not-exist.dcm"))
        .unwrap_err();
    assert!(matches!(err, ParseError::Io(_)));
}

#[test]
fn test_extract_missing_sop_instance_uid() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("no_sop.dcm");
    let mut fixture = helpers::TestInstance::new("PAT001", "1.2.3", "1.2.3.4", "1.2.3.4.5");
    fixture.sop_uid_in_dataset = false;
    fixture.write_to(&path);

    let err = MetadataExtractor::new().extract(&path).unwrap_err();
    assert!(matches!(
        err,
        ParseError::MissingRequiredField("SOPInstanceUID")
    ));
}

#[test]
fn test_extract_missing_patient_id() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("no_patient.dcm");
    let mut fixture = helpers::TestInstance::new("PAT001", "1.2.3", "1.2.3.4", "1.2.3.4.5");
    fixture.patient_id = None;
    fixture.write_to(&path);

    let err = MetadataExtractor::new().extract(&path).unwrap_err();
    assert!(matches!(err, ParseError::MissingRequiredField("PatientID")));
}

#[test]
fn test_cache_entries_cover_present_fields_only() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("sparse.dcm");
    let mut fixture = helpers::TestInstance::new("PAT001", "1.2.3", "1.2.3.4", "1.2.3.4.5");
    fixture.modality = None;
    fixture.series_description = None;
    fixture.write_to(&path);

    let meta = MetadataExtractor::new().extract(&path).unwrap();
    let entries = meta.cache_entries();

    use dicat_import::services::metadata_extractor::tag_keys;
    let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
    assert!(keys.contains(&tag_keys::PATIENT_ID));
    assert!(keys.contains(&tag_keys::STUDY_INSTANCE_UID));
    assert!(keys.contains(&tag_keys::PATIENT_NAME));
    assert!(!keys.contains(&tag_keys::MODALITY));
    assert!(!keys.contains(&tag_keys::SERIES_DESCRIPTION));
}
