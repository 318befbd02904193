use core_library::LibraryError;
use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    #[error("Library root does not exist: {0}")]
    RootNotFound(String),

    #[error("Library root is not a directory: {0}")]
    NotADirectory(String),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Scan task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
