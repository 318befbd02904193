//! # Library Scanner
//!
//! Walks a library root for audio files and imports them into the library
//! database, reporting progress along the way.
//!
//! - [`FileScanner`] enumerates candidate files (blocking, `walkdir`)
//! - [`LibraryScanner`] extracts metadata, resolves artists and albums,
//!   upserts tracks and publishes [`core_runtime::events::ScanEvent`]s

pub mod error;
pub mod file_scanner;
pub mod library_scanner;
pub mod progress;

pub use error::{Result, ScanError};
pub use file_scanner::FileScanner;
pub use library_scanner::{LibraryScanner, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
pub use progress::{ScanProgress, ScanSummary};
