//! Progress and summary types reported by a library scan.

use serde::{Deserialize, Serialize};

/// Snapshot of a running scan, reported after every processed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub scanned_files: u64,
    pub total_files: u64,
    /// Fraction complete in `[0.0, 1.0]`; an empty scan is complete.
    pub percentage: f64,
    pub current_file: Option<String>,
}

impl ScanProgress {
    pub fn new(scanned_files: u64, total_files: u64, current_file: Option<String>) -> Self {
        let percentage = if total_files == 0 {
            1.0
        } else {
            (scanned_files as f64 / total_files as f64).clamp(0.0, 1.0)
        };

        Self {
            scanned_files,
            total_files,
            percentage,
            current_file,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.scanned_files >= self.total_files
    }
}

/// Outcome of a finished scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Audio files found under the root
    pub total_files: u64,
    /// Files processed, successfully or not
    pub scanned_files: u64,
    /// Tracks newly added
    pub imported: u64,
    /// Existing tracks refreshed from their files
    pub updated: u64,
    /// Files whose metadata or import failed
    pub failed: u64,
}
