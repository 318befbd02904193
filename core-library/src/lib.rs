//! # Library Management Module
//!
//! Owns the music library database and the repository layer over it.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and migrations
//! - Domain models (users, libraries, artists, albums, tracks, playlists)
//! - Repositories with find-or-create lookups and pagination
//! - Playlist position renumbering
//! - Duration formatting for display

pub mod db;
pub mod duration;
pub mod error;
pub mod models;
pub mod ordering;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use repositories::{Page, PageRequest};
