//! Import coordinator
//!
//! Drives the whole import: discovery -> parse -> dedup insert -> tag cache
//! write-through, and accounts for what this operation actually added.
//!
//! Parsing is a pure function of the file bytes, so it runs on a bounded
//! pool of blocking workers. Results feed a single sequential writer that
//! performs the insert-and-count step, which keeps the four-level
//! insert-if-absent atomic without serializing the expensive parse work.
//! Cancellation is cooperative and checked between files; everything
//! committed before the cancellation point stays durable.

use crate::db::catalog::{self, CatalogError, InsertOutcome, InsertReport};
use crate::db::tag_cache;
use crate::error::ImportError;
use crate::models::{ImportFileError, ImportSummary};
use crate::services::file_scanner::FileScanner;
use crate::services::metadata_extractor::{MetadataExtractor, ParseError, RecordMetadata};
use dicat_common::models::{Instance, Patient, Series, StorageMode, Study};
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Callback invoked once before an import begins; returning false declines.
pub type ConfirmCallback = Box<dyn Fn(usize) -> bool + Send + Sync>;

/// Whether to ask an external collaborator before importing
pub enum ConfirmPolicy {
    /// Proceed without asking
    Proceed,
    /// Ask the callback, passing the number of files about to be imported.
    /// Declining aborts the whole operation with zero side effects.
    Prompt(ConfirmCallback),
}

impl ConfirmPolicy {
    fn allows(&self, file_count: usize) -> bool {
        match self {
            ConfirmPolicy::Proceed => true,
            ConfirmPolicy::Prompt(callback) => callback(file_count),
        }
    }
}

/// Per-file indexing failure; recoverable, the import moves on to the next file
#[derive(Debug, Error)]
enum IndexError {
    #[error("Failed to copy into managed storage: {0}")]
    Copy(std::io::Error),

    #[error(transparent)]
    Catalog(CatalogError),
}

impl IndexError {
    fn code(&self) -> &'static str {
        match self {
            IndexError::Copy(_) => "COPY_ERROR",
            IndexError::Catalog(_) => "CATALOG_ERROR",
        }
    }
}

/// Import coordinator
pub struct ImportCoordinator {
    db: SqlitePool,
    tag_db: SqlitePool,
    scanner: FileScanner,
    /// Managed store for `Copied` instances
    storage_dir: PathBuf,
    parse_workers: usize,
}

impl ImportCoordinator {
    /// Create a coordinator over already-open catalog and tag cache pools.
    ///
    /// `storage_dir` is the managed store that owns the bytes of `Copied`
    /// instances; it is created lazily on first copy.
    pub fn new(db: SqlitePool, tag_db: SqlitePool, storage_dir: PathBuf) -> Self {
        let parse_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            db,
            tag_db,
            scanner: FileScanner::new(),
            storage_dir,
            parse_workers,
        }
    }

    /// Override the parse worker pool size (minimum 1).
    pub fn with_parse_workers(mut self, workers: usize) -> Self {
        self.parse_workers = workers.max(1);
        self
    }

    /// Import every DICOM file found under the given directories.
    ///
    /// Discovery runs first; the confirmation policy is consulted once with
    /// the discovered file count before any side effect. Declining returns
    /// [`ImportError::Aborted`] with the catalog and counters untouched.
    pub async fn import_directories(
        &self,
        dirs: &[PathBuf],
        mode: StorageMode,
        confirm: &ConfirmPolicy,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary, ImportError> {
        let mut files = Vec::new();
        for dir in dirs {
            files.extend(self.scanner.scan(dir)?);
        }

        if !confirm.allows(files.len()) {
            tracing::info!(file_count = files.len(), "Import declined by confirmation policy");
            return Err(ImportError::Aborted);
        }

        self.run_import(files, mode, cancel).await
    }

    /// Import an explicit list of files.
    pub async fn import_files(
        &self,
        paths: Vec<PathBuf>,
        mode: StorageMode,
        confirm: &ConfirmPolicy,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary, ImportError> {
        if !confirm.allows(paths.len()) {
            tracing::info!(file_count = paths.len(), "Import declined by confirmation policy");
            return Err(ImportError::Aborted);
        }

        self.run_import(paths, mode, cancel).await
    }

    async fn run_import(
        &self,
        paths: Vec<PathBuf>,
        mode: StorageMode,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary, ImportError> {
        let op_id = Uuid::new_v4();
        let mut summary = ImportSummary::new();

        tracing::info!(
            op_id = %op_id,
            file_count = paths.len(),
            mode = mode.as_str(),
            "Starting import operation"
        );

        if cancel.is_cancelled() {
            tracing::info!(op_id = %op_id, "Import cancelled before any file was processed");
            return Ok(summary);
        }

        // Bounded parallel parse feeding the single sequential writer below.
        // buffered() preserves input order, so results arrive deterministically.
        let mut parsed_stream = stream::iter(paths)
            .map(|path| {
                tokio::task::spawn_blocking(move || {
                    let result = MetadataExtractor::new().extract(&path);
                    (path, result)
                })
            })
            .buffered(self.parse_workers);

        while let Some(joined) = parsed_stream.next().await {
            let (path, parsed) = joined?;

            if cancel.is_cancelled() {
                tracing::info!(
                    op_id = %op_id,
                    files_processed = summary.files_processed,
                    "Import cancelled; work committed so far remains durable"
                );
                break;
            }

            let meta = match parsed {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(
                        op_id = %op_id,
                        file = %path.display(),
                        error = %e,
                        "Skipping unparseable file"
                    );
                    summary.files_skipped += 1;
                    summary.errors.push(ImportFileError::new(
                        path.display().to_string(),
                        parse_error_code(&e),
                        e.to_string(),
                    ));
                    continue;
                }
            };

            match self.index_one(&path, &meta, mode).await {
                Ok(report) => {
                    summary.files_processed += 1;
                    if report.outcome == InsertOutcome::Inserted {
                        summary.instances_added += 1;
                    }
                    if report.patient_added {
                        summary.patients_added += 1;
                    }
                    if report.study_added {
                        summary.studies_added += 1;
                    }
                    if report.series_added {
                        summary.series_added += 1;
                    }
                    tracing::debug!(
                        op_id = %op_id,
                        file = %path.display(),
                        sop_uid = %meta.sop_instance_uid,
                        outcome = ?report.outcome,
                        "Indexed file"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        op_id = %op_id,
                        file = %path.display(),
                        error = %e,
                        "Failed to index file, continuing with next"
                    );
                    summary.files_skipped += 1;
                    summary.errors.push(ImportFileError::new(
                        path.display().to_string(),
                        e.code(),
                        e.to_string(),
                    ));
                }
            }

            // Write-through regardless of insert outcome: the cache is about
            // read acceleration, not catalog novelty. Cache failures are
            // logged, never fatal.
            if let Err(e) =
                tag_cache::put_many(&self.tag_db, &meta.sop_instance_uid, &meta.cache_entries())
                    .await
            {
                tracing::warn!(
                    op_id = %op_id,
                    file = %path.display(),
                    error = %e,
                    "Failed to write tag cache"
                );
            }
        }

        tracing::info!(
            op_id = %op_id,
            patients_added = summary.patients_added,
            studies_added = summary.studies_added,
            series_added = summary.series_added,
            instances_added = summary.instances_added,
            files_processed = summary.files_processed,
            files_skipped = summary.files_skipped,
            "Import operation finished"
        );

        Ok(summary)
    }

    /// Steps 2-4 for one parsed file: resolve the stored path for the
    /// requested mode, then insert-if-absent.
    async fn index_one(
        &self,
        source: &Path,
        meta: &RecordMetadata,
        mode: StorageMode,
    ) -> Result<InsertReport, IndexError> {
        let (stored_path, fresh_copy) = match mode {
            StorageMode::Linked => (source.display().to_string(), false),
            StorageMode::Copied => self
                .copy_into_storage(source, meta)
                .map_err(IndexError::Copy)?,
        };

        let (patient, study, series, instance) = hierarchy_rows(meta, stored_path, mode);

        match catalog::insert_instance_if_absent(&self.db, &patient, &study, &series, &instance)
            .await
        {
            Ok(report) => {
                if fresh_copy && report.outcome == InsertOutcome::AlreadyPresent {
                    // The instance was first imported in Linked mode; the
                    // copy made for this attempt is orphaned. Mode stays as
                    // inserted originally.
                    let _ = std::fs::remove_file(&instance.file_path);
                }
                Ok(report)
            }
            Err(e) => {
                if fresh_copy {
                    let _ = std::fs::remove_file(&instance.file_path);
                }
                Err(IndexError::Catalog(e))
            }
        }
    }

    /// Duplicate the file bytes into the managed store, keyed by hierarchy
    /// UIDs. Returns the managed path and whether the copy was made by this
    /// call (an already-present managed file is reused, not rewritten).
    fn copy_into_storage(
        &self,
        source: &Path,
        meta: &RecordMetadata,
    ) -> std::io::Result<(String, bool)> {
        let dir = self
            .storage_dir
            .join(&meta.study_instance_uid)
            .join(&meta.series_instance_uid);
        std::fs::create_dir_all(&dir)?;

        let dest = dir.join(format!("{}.dcm", meta.sop_instance_uid));
        if dest.exists() {
            return Ok((dest.display().to_string(), false));
        }

        std::fs::copy(source, &dest)?;
        Ok((dest.display().to_string(), true))
    }
}

/// Build the four hierarchy rows an insert needs from one parsed record.
fn hierarchy_rows(
    meta: &RecordMetadata,
    stored_path: String,
    mode: StorageMode,
) -> (Patient, Study, Series, Instance) {
    let patient = Patient {
        patient_id: meta.patient_id.clone(),
        patient_name: meta.patient_name.clone(),
        birth_date: meta.patient_birth_date,
    };
    let study = Study {
        study_instance_uid: meta.study_instance_uid.clone(),
        patient_id: meta.patient_id.clone(),
        study_date: meta.study_date,
        description: meta.study_description.clone(),
        accession_number: meta.accession_number.clone(),
    };
    let series = Series {
        series_instance_uid: meta.series_instance_uid.clone(),
        study_instance_uid: meta.study_instance_uid.clone(),
        modality: meta.modality.clone(),
        series_number: meta.series_number,
        description: meta.series_description.clone(),
    };
    let instance = Instance {
        sop_instance_uid: meta.sop_instance_uid.clone(),
        series_instance_uid: meta.series_instance_uid.clone(),
        file_path: stored_path,
        storage_mode: mode,
        file_size: meta.file_size as i64,
        sop_class_uid: meta.sop_class_uid.clone(),
        instance_number: meta.instance_number,
    };
    (patient, study, series, instance)
}

fn parse_error_code(e: &ParseError) -> &'static str {
    match e {
        ParseError::Io(_) => "IO_ERROR",
        ParseError::NotARecord(_) => "NOT_DICOM",
        ParseError::MissingRequiredField(_) => "MISSING_FIELD",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> RecordMetadata {
        RecordMetadata {
            patient_id: "PAT001".to_string(),
            study_instance_uid: "1.2.3.1".to_string(),
            series_instance_uid: "1.2.3.1.1".to_string(),
            sop_instance_uid: "1.2.3.1.1.1".to_string(),
            patient_name: Some("Doe^Jane".to_string()),
            patient_birth_date: None,
            study_date: None,
            study_description: None,
            accession_number: None,
            modality: Some("CT".to_string()),
            series_number: Some(3),
            series_description: None,
            sop_class_uid: None,
            instance_number: Some(1),
            file_size: 512,
        }
    }

    #[test]
    fn test_hierarchy_rows_link_parent_keys() {
        let meta = sample_meta();
        let (patient, study, series, instance) =
            hierarchy_rows(&meta, "/data/a.dcm".to_string(), StorageMode::Linked);

        assert_eq!(study.patient_id, patient.patient_id);
        assert_eq!(series.study_instance_uid, study.study_instance_uid);
        assert_eq!(instance.series_instance_uid, series.series_instance_uid);
        assert_eq!(instance.storage_mode, StorageMode::Linked);
        assert_eq!(instance.file_size, 512);
    }

    #[test]
    fn test_confirm_policy() {
        assert!(ConfirmPolicy::Proceed.allows(10));
        assert!(ConfirmPolicy::Prompt(Box::new(|n| n < 5)).allows(3));
        assert!(!ConfirmPolicy::Prompt(Box::new(|_| false)).allows(0));
    }
}
