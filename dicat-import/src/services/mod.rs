//! Import engine services

pub mod file_scanner;
pub mod import_coordinator;
pub mod metadata_extractor;

pub use file_scanner::FileScanner;
pub use import_coordinator::{ConfirmPolicy, ImportCoordinator};
pub use metadata_extractor::MetadataExtractor;
