//! SQLite store access for dicat
//!
//! The catalog and the tag cache live in two independently-openable
//! databases under the configured directory, each created on first open.

pub mod init;
