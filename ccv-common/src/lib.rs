//! # ChronoCanvas Common Library
//!
//! Shared code for the ChronoCanvas services:
//! - Error types
//! - Configuration loading (TOML file + environment overrides)
//! - Input sanitization for the query key fields

pub mod config;
pub mod error;
pub mod sanitize;

pub use error::{Error, Result};
