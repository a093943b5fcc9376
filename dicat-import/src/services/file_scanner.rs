//! DICOM file scanner
//!
//! Recursive discovery of DICOM part-10 files under a directory tree.
//! Two-phase implementation: sequential traversal with symlink-loop
//! detection, then parallel preamble verification. DICOM files frequently
//! carry no extension at all, so every regular file is a candidate and
//! eligibility is decided by the "DICM" magic at byte offset 128.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use rayon::prelude::*;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Byte offset of the "DICM" marker after the part-10 preamble.
const DICM_MAGIC_OFFSET: usize = 128;

/// File scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),
}

/// Scan result with statistics
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// DICOM file paths found
    pub files: Vec<PathBuf>,
    /// Total size of all files in bytes
    pub total_size: u64,
}

/// DICOM file scanner
pub struct FileScanner {
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl FileScanner {
    /// Create new file scanner with default ignore patterns
    ///
    /// Ignores system files like .DS_Store, Thumbs.db, .git, etc.
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
                "DICOMDIR".to_string(),
            ],
            max_depth: None,
        }
    }

    /// Scan a directory tree for DICOM files
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        // Phase 1: Sequential directory traversal + symlink detection
        // This must be sequential because symlink_visited is mutable
        let mut candidate_files = Vec::new();
        let mut symlink_visited = HashSet::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        candidate_files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }

        tracing::debug!(
            "Phase 1 complete: {} candidate files discovered",
            candidate_files.len()
        );

        // Phase 2: Parallel preamble verification
        // Each thread reads a different file independently
        let mut dicom_files: Vec<PathBuf> = candidate_files
            .par_iter()
            .filter_map(|path| match self.is_dicom_file(path) {
                Ok(true) => Some(path.clone()),
                Ok(false) => None,
                Err(e) => {
                    tracing::warn!("Error verifying {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        // par_iter preserves order, but sort anyway so callers see a stable
        // sequence regardless of filesystem enumeration order
        dicom_files.sort();

        tracing::debug!(
            "Phase 2 complete: {} DICOM files verified from {} candidates",
            dicom_files.len(),
            candidate_files.len()
        );

        Ok(dicom_files)
    }

    /// Scan with statistics
    pub fn scan_with_stats(&self, root_path: &Path) -> Result<ScanResult, ScanError> {
        let files = self.scan(root_path)?;

        let mut total_size = 0u64;
        for file in &files {
            if let Ok(metadata) = std::fs::metadata(file) {
                total_size += metadata.len();
            }
        }

        Ok(ScanResult { total_size, files })
    }

    /// Check if entry should be processed
    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        // Skip ignored names. Exact match only: a file that merely contains
        // an ignored name (e.g. "scan.git.dcm") is still a candidate.
        for pattern in &self.ignore_patterns {
            if file_name == pattern.as_str() {
                return false;
            }
        }

        // Detect symlink loops
        if entry.file_type().is_symlink() {
            if let Ok(canonical) = path.canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", path.display());
                    return false;
                }
            }
        }

        true
    }

    /// Check for the part-10 "DICM" marker at offset 128
    fn is_dicom_file(&self, path: &Path) -> Result<bool, ScanError> {
        let mut file = File::open(path)
            .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

        let mut buffer = [0u8; DICM_MAGIC_OFFSET + 4];
        let mut read_total = 0;
        while read_total < buffer.len() {
            let n = file
                .read(&mut buffer[read_total..])
                .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;
            if n == 0 {
                break;
            }
            read_total += n;
        }

        if read_total < buffer.len() {
            return Ok(false); // Too small to hold the preamble
        }

        Ok(&buffer[DICM_MAGIC_OFFSET..] == b"DICM")
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}
