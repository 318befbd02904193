//! File scanning for audio files

use crate::error::{Result, ScanError};
use core_runtime::config::{CoreConfig, DEFAULT_AUDIO_EXTENSIONS};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Scanner for audio files in directories
#[derive(Debug, Clone)]
pub struct FileScanner {
    /// Lowercase extensions without the leading dot
    extensions: Vec<String>,

    /// Whether to follow symbolic links
    follow_links: bool,

    /// Maximum depth to traverse (`None` for unlimited)
    max_depth: Option<usize>,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            follow_links: false,
            max_depth: None,
        }
    }
}

impl FileScanner {
    /// Create a new file scanner with the default audio extensions
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner honoring the extensions, link policy and depth of `config`
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            follow_links: config.follow_links,
            max_depth: config.max_scan_depth,
            ..Self::default()
        }
        .with_extensions(&config.audio_extensions)
    }

    /// Replace the recognized extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Set whether to follow symbolic links
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Set maximum directory depth to traverse
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Scan a directory for audio files
    ///
    /// Hidden files and directories (leading `.`) are skipped, as are entries
    /// that cannot be read. The result is sorted by path.
    ///
    /// # Errors
    ///
    /// `RootNotFound` if `path` does not exist, `NotADirectory` if it is a file.
    pub fn scan_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !path.exists() {
            return Err(ScanError::RootNotFound(path.display().to_string()));
        }

        if !path.is_dir() {
            return Err(ScanError::NotADirectory(path.display().to_string()));
        }

        let mut walker = WalkDir::new(path).follow_links(self.follow_links);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut audio_files = Vec::new();
        let entries = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_audio_file(entry.path()) {
                audio_files.push(entry.into_path());
            }
        }

        audio_files.sort();
        Ok(audio_files)
    }

    /// Check if a file has one of the recognized extensions
    pub fn is_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
