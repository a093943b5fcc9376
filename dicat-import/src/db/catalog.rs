//! Hierarchy catalog operations
//!
//! The catalog holds four node kinds linked parent -> child, each keyed by
//! its DICOM business identifier. The one write operation the importer uses
//! is [`insert_instance_if_absent`]: a single transaction that inserts the
//! missing part of the ancestor chain and the instance row, or reports the
//! instance as already present. Everything else is read-only enumeration.

use chrono::NaiveDate;
use dicat_common::models::{Instance, Patient, Series, StorageMode, Study};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

/// Catalog storage errors, recoverable at the file level
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying storage failure (disk full, corruption, ...)
    #[error("Storage failure: {0}")]
    StorageFailure(sqlx::Error),

    /// A uniqueness or referential constraint was violated
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => {
                    return CatalogError::ConstraintViolation(db_err.message().to_string());
                }
                _ => {}
            }
        }
        CatalogError::StorageFailure(e)
    }
}

/// Whether the instance row was new to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// What one insert operation actually changed
///
/// The ancestor flags are the catalog-state diff measured inside the insert
/// transaction (rows affected per level), so an ancestor shared by many
/// instances reports `true` exactly once per import operation.
#[derive(Debug, Clone, Copy)]
pub struct InsertReport {
    pub outcome: InsertOutcome,
    pub patient_added: bool,
    pub study_added: bool,
    pub series_added: bool,
}

/// Insert an instance and any missing ancestors, all within one transaction.
///
/// Every level is insert-if-absent (`ON CONFLICT DO NOTHING`): an existing
/// key is a no-op for that node, while its missing descendants are still
/// inserted. Ancestors are not assumed to exist just because the instance
/// does, so a chain broken by external tampering is repaired here.
pub async fn insert_instance_if_absent(
    pool: &SqlitePool,
    patient: &Patient,
    study: &Study,
    series: &Series,
    instance: &Instance,
) -> Result<InsertReport, CatalogError> {
    let mut tx = pool.begin().await?;

    let patient_added = sqlx::query(
        r#"
        INSERT INTO patients (patient_id, patient_name, birth_date)
        VALUES (?, ?, ?)
        ON CONFLICT(patient_id) DO NOTHING
        "#,
    )
    .bind(&patient.patient_id)
    .bind(&patient.patient_name)
    .bind(patient.birth_date.map(|d| d.to_string()))
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    let study_added = sqlx::query(
        r#"
        INSERT INTO studies (study_instance_uid, patient_id, study_date, description, accession_number)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(study_instance_uid) DO NOTHING
        "#,
    )
    .bind(&study.study_instance_uid)
    .bind(&study.patient_id)
    .bind(study.study_date.map(|d| d.to_string()))
    .bind(&study.description)
    .bind(&study.accession_number)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    let series_added = sqlx::query(
        r#"
        INSERT INTO series (series_instance_uid, study_instance_uid, modality, series_number, description)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(series_instance_uid) DO NOTHING
        "#,
    )
    .bind(&series.series_instance_uid)
    .bind(&series.study_instance_uid)
    .bind(&series.modality)
    .bind(series.series_number)
    .bind(&series.description)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    let instance_added = sqlx::query(
        r#"
        INSERT INTO instances
            (sop_instance_uid, series_instance_uid, file_path, storage_mode,
             file_size, sop_class_uid, instance_number)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(sop_instance_uid) DO NOTHING
        "#,
    )
    .bind(&instance.sop_instance_uid)
    .bind(&instance.series_instance_uid)
    .bind(&instance.file_path)
    .bind(instance.storage_mode.as_str())
    .bind(instance.file_size)
    .bind(&instance.sop_class_uid)
    .bind(instance.instance_number)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    tx.commit().await?;

    let outcome = if instance_added {
        InsertOutcome::Inserted
    } else {
        InsertOutcome::AlreadyPresent
    };

    Ok(InsertReport {
        outcome,
        patient_added,
        study_added,
        series_added,
    })
}

/// All patient IDs in the catalog, each exactly once.
pub async fn patients(pool: &SqlitePool) -> Result<Vec<String>, CatalogError> {
    let ids = sqlx::query_scalar("SELECT patient_id FROM patients ORDER BY patient_id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Study UIDs belonging to a patient; empty for an unknown patient ID.
pub async fn studies_for_patient(
    pool: &SqlitePool,
    patient_id: &str,
) -> Result<Vec<String>, CatalogError> {
    let uids = sqlx::query_scalar(
        "SELECT study_instance_uid FROM studies WHERE patient_id = ? ORDER BY study_instance_uid",
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(uids)
}

/// Series UIDs belonging to a study; empty for an unknown study UID.
pub async fn series_for_study(
    pool: &SqlitePool,
    study_instance_uid: &str,
) -> Result<Vec<String>, CatalogError> {
    let uids = sqlx::query_scalar(
        "SELECT series_instance_uid FROM series WHERE study_instance_uid = ? ORDER BY series_instance_uid",
    )
    .bind(study_instance_uid)
    .fetch_all(pool)
    .await?;
    Ok(uids)
}

/// SOP instance UIDs belonging to a series; empty for an unknown series UID.
pub async fn instances_for_series(
    pool: &SqlitePool,
    series_instance_uid: &str,
) -> Result<Vec<String>, CatalogError> {
    let uids = sqlx::query_scalar(
        "SELECT sop_instance_uid FROM instances WHERE series_instance_uid = ? ORDER BY sop_instance_uid",
    )
    .bind(series_instance_uid)
    .fetch_all(pool)
    .await?;
    Ok(uids)
}

/// Load a patient record by patient ID.
pub async fn patient(pool: &SqlitePool, patient_id: &str) -> Result<Option<Patient>, CatalogError> {
    let row = sqlx::query(
        "SELECT patient_id, patient_name, birth_date FROM patients WHERE patient_id = ?",
    )
    .bind(patient_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Patient {
        patient_id: row.get("patient_id"),
        patient_name: row.get("patient_name"),
        birth_date: parse_date(row.get("birth_date")),
    }))
}

/// Load a study record by study instance UID.
pub async fn study(pool: &SqlitePool, study_instance_uid: &str) -> Result<Option<Study>, CatalogError> {
    let row = sqlx::query(
        r#"
        SELECT study_instance_uid, patient_id, study_date, description, accession_number
        FROM studies
        WHERE study_instance_uid = ?
        "#,
    )
    .bind(study_instance_uid)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Study {
        study_instance_uid: row.get("study_instance_uid"),
        patient_id: row.get("patient_id"),
        study_date: parse_date(row.get("study_date")),
        description: row.get("description"),
        accession_number: row.get("accession_number"),
    }))
}

/// Load a series record by series instance UID.
pub async fn series(pool: &SqlitePool, series_instance_uid: &str) -> Result<Option<Series>, CatalogError> {
    let row = sqlx::query(
        r#"
        SELECT series_instance_uid, study_instance_uid, modality, series_number, description
        FROM series
        WHERE series_instance_uid = ?
        "#,
    )
    .bind(series_instance_uid)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Series {
        series_instance_uid: row.get("series_instance_uid"),
        study_instance_uid: row.get("study_instance_uid"),
        modality: row.get("modality"),
        series_number: row.get("series_number"),
        description: row.get("description"),
    }))
}

/// Load an instance record by SOP instance UID.
pub async fn instance(pool: &SqlitePool, sop_instance_uid: &str) -> Result<Option<Instance>, CatalogError> {
    let row = sqlx::query(
        r#"
        SELECT sop_instance_uid, series_instance_uid, file_path, storage_mode,
               file_size, sop_class_uid, instance_number
        FROM instances
        WHERE sop_instance_uid = ?
        "#,
    )
    .bind(sop_instance_uid)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let mode: String = row.get("storage_mode");
        Instance {
            sop_instance_uid: row.get("sop_instance_uid"),
            series_instance_uid: row.get("series_instance_uid"),
            file_path: row.get("file_path"),
            storage_mode: StorageMode::from_db(&mode),
            file_size: row.get("file_size"),
            sop_class_uid: row.get("sop_class_uid"),
            instance_number: row.get("instance_number"),
        }
    }))
}

/// Per-level row totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub patients: i64,
    pub studies: i64,
    pub series: i64,
    pub instances: i64,
}

/// Count rows at every level of the hierarchy.
pub async fn counts(pool: &SqlitePool) -> Result<CatalogCounts, CatalogError> {
    let patients: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
        .fetch_one(pool)
        .await?;
    let studies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM studies")
        .fetch_one(pool)
        .await?;
    let series: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM series")
        .fetch_one(pool)
        .await?;
    let instances: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM instances")
        .fetch_one(pool)
        .await?;

    Ok(CatalogCounts {
        patients,
        studies,
        series,
        instances,
    })
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}
