//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the Cadence core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other crate in the workspace depends on this one for its logging
//! conventions, the `CoreConfig` it is constructed from, and the broadcast
//! channel it publishes state changes on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
