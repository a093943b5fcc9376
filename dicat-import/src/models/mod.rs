//! Import engine data models

pub mod import_summary;

pub use import_summary::{ImportFileError, ImportSummary};
