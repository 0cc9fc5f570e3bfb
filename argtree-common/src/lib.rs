//! # Argtree Common Library
//!
//! Shared code for the argument-tree crates:
//! - Error type used by configuration and store layers
//! - TOML configuration loading with ENV overrides
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
