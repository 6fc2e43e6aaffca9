//! Centralized validation for fileserv
//!
//! - Filename validation (flat namespace, no traversal)
//! - Configuration validation (pool size, timeouts)

use std::error::Error;
use std::fmt;

pub mod config;
pub mod path;

pub use config::*;
pub use path::*;

/// Generic validation error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	/// Invalid configuration
	ConfigError(String),
	/// Invalid filename
	PathError(String),
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValidationError::ConfigError(msg) => write!(f, "Invalid configuration: {}", msg),
			ValidationError::PathError(msg) => write!(f, "Invalid filename: {}", msg),
		}
	}
}

impl Error for ValidationError {}

/// Trait for validatable types
pub trait Validator {
	/// Returns Ok(()) if valid, Err(ValidationError) if invalid
	fn validate(&self) -> Result<(), ValidationError>;
}


// vim: ts=4
