//! # Core Configuration Module
//!
//! `CoreConfig` carries every setting the core needs at startup: where the
//! library database lives, which files a scan treats as audio, how deep a
//! scan may descend, the event buffer size and the logging setup.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/home/ana/.local/share/cadence/library.db")
//!     .follow_links(true)
//!     .build()?;
//! ```
//!
//! `build()` fails fast with [`Error::Config`] on inconsistent values.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File extensions a scan treats as audio when none are configured.
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "aac", "m4a", "opus", "aiff", "alac", "wma",
];

/// Validated startup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// SQLite database file; `None` keeps the library in memory.
    pub database_path: Option<PathBuf>,
    /// Lowercase extensions (no leading dot) recognized as audio files.
    pub audio_extensions: Vec<String>,
    /// Follow symbolic links while scanning.
    pub follow_links: bool,
    /// Maximum directory depth below a library root; `None` is unlimited.
    pub max_scan_depth: Option<usize>,
    /// Per-subscriber buffer of the event bus.
    pub event_buffer_size: usize,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// In-memory configuration with defaults everywhere else.
    pub fn in_memory() -> Self {
        Self {
            database_path: None,
            audio_extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            follow_links: false,
            max_scan_depth: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            logging: LoggingConfig::default(),
        }
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path, when set, is not empty
    /// - At least one audio extension is configured, none empty or dotted
    /// - Scan depth, when set, is at least 1
    /// - Event buffer is between 1 and 65 536
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.audio_extensions.is_empty() {
            return Err(Error::Config(
                "At least one audio extension must be configured".to_string(),
            ));
        }

        if let Some(bad) = self
            .audio_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(Error::Config(format!(
                "Invalid audio extension '{}': use a bare extension such as \"flac\"",
                bad
            )));
        }

        if self.max_scan_depth == Some(0) {
            return Err(Error::Config(
                "Max scan depth must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 65_536 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 65536".to_string(),
            ));
        }

        Ok(())
    }

    /// Case-insensitive check against the configured audio extensions.
    pub fn is_audio_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.audio_extensions.iter().any(|ext| *ext == extension)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    audio_extensions: Option<Vec<String>>,
    follow_links: bool,
    max_scan_depth: Option<usize>,
    event_buffer_size: Option<usize>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Persist the library in the SQLite file at `path`.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Replace the recognized audio extensions. Values are lowercased and a
    /// leading dot is stripped.
    pub fn audio_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.audio_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
                .collect(),
        );
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn max_scan_depth(mut self, depth: usize) -> Self {
        self.max_scan_depth = Some(depth);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when [`CoreConfig::validate`] rejects the result.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::in_memory();

        let config = CoreConfig {
            database_path: self.database_path,
            audio_extensions: self.audio_extensions.unwrap_or(defaults.audio_extensions),
            follow_links: self.follow_links,
            max_scan_depth: self.max_scan_depth,
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
            logging: self.logging.unwrap_or(defaults.logging),
        };

        config.validate()?;
        Ok(config)
    }
}
