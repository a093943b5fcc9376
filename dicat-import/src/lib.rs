//! dicat-import - DICOM import and indexing engine
//!
//! Discovers DICOM files on disk, extracts their identifying metadata, and
//! inserts new hierarchy nodes (patient -> study -> series -> instance) into
//! the persistent catalog, silently skipping records that are already
//! present. A side cache of frequently-needed tag values is maintained as a
//! byproduct of parsing so later queries avoid re-reading source files.

pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::ImportError;
pub use crate::models::{ImportFileError, ImportSummary};
pub use crate::services::import_coordinator::{ConfirmPolicy, ImportCoordinator};
