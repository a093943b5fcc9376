//! Shared types for the dicat DICOM catalog
//!
//! Provides the common error type, the domain models for the four-level
//! patient/study/series/instance hierarchy, and SQLite store initialization.

pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
