//! Configuration validation functions

use super::ValidationError;

/// Largest accepted worker pool
pub const MAX_WORKERS: usize = 1024;

/// Validate worker pool size
pub fn validate_workers(workers: usize) -> Result<(), ValidationError> {
	if workers == 0 {
		return Err(ValidationError::ConfigError("workers must be at least 1".to_string()));
	}
	if workers > MAX_WORKERS {
		return Err(ValidationError::ConfigError(format!(
			"workers must be at most {}, got {}",
			MAX_WORKERS, workers
		)));
	}
	Ok(())
}

/// Validate a timeout in milliseconds
pub fn validate_timeout_ms(what: &str, timeout_ms: u64) -> Result<(), ValidationError> {
	if timeout_ms == 0 {
		return Err(ValidationError::ConfigError(format!("{} must be greater than 0", what)));
	}
	if timeout_ms > 3_600_000 {
		return Err(ValidationError::ConfigError(format!(
			"{} too large: {} ms (max 3600000)",
			what, timeout_ms
		)));
	}
	Ok(())
}

/// The drain timeout is the shortened one; it may not exceed the initial wait
pub fn validate_timeout_order(initial_ms: u64, drain_ms: u64) -> Result<(), ValidationError> {
	if drain_ms > initial_ms {
		return Err(ValidationError::ConfigError(format!(
			"drainTimeoutMs ({}) exceeds initialTimeoutMs ({})",
			drain_ms, initial_ms
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validate_workers() {
		assert!(validate_workers(1).is_ok());
		assert!(validate_workers(5).is_ok());
		assert!(validate_workers(0).is_err());
		assert!(validate_workers(MAX_WORKERS + 1).is_err());
	}

	#[test]
	fn test_validate_timeout_ms() {
		assert!(validate_timeout_ms("t", 500).is_ok());
		assert!(validate_timeout_ms("t", 0).is_err());
		assert!(validate_timeout_ms("t", 3_600_001).is_err());
	}

	#[test]
	fn test_validate_timeout_order() {
		assert!(validate_timeout_order(5000, 500).is_ok());
		assert!(validate_timeout_order(5000, 5000).is_ok());
		assert!(validate_timeout_order(500, 5000).is_err());
	}
}

// vim: ts=4
