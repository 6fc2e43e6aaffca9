//! Filename validation
//!
//! The store is a single flat directory. A filename must name exactly one
//! entry directly inside it: no separators, no `.`/`..`, not absolute.

use std::path::{Component, Path};

use super::ValidationError;
use crate::storage::TEMP_SUFFIX;

/// Check if a name is a single normal path component
pub fn is_flat_name(name: &str) -> bool {
	let mut components = Path::new(name).components();
	matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

/// Validate a client-supplied filename
///
/// Rejects empty names, absolute paths, anything containing `/` or `\`,
/// `.` and `..`, NUL bytes and names reserved for in-progress uploads.
pub fn validate_filename(name: &str) -> Result<(), ValidationError> {
	if name.is_empty() {
		return Err(ValidationError::PathError("filename is empty".to_string()));
	}
	if Path::new(name).is_absolute() {
		return Err(ValidationError::PathError(format!("must be relative, got {:?}", name)));
	}
	if name.contains('/') || name.contains('\\') || name.contains('\0') {
		return Err(ValidationError::PathError(format!(
			"path separators are not allowed: {:?}",
			name
		)));
	}
	if name.contains("..") || !is_flat_name(name) {
		return Err(ValidationError::PathError(format!(
			"parent directory references are not allowed: {:?}",
			name
		)));
	}
	if name.ends_with(TEMP_SUFFIX) {
		return Err(ValidationError::PathError(format!("reserved name: {:?}", name)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_valid_names() {
		assert!(validate_filename("a.txt").is_ok());
		assert!(validate_filename("pokijan.jpg").is_ok());
		assert!(validate_filename("no_extension").is_ok());
		assert!(validate_filename("with space.bin").is_ok());
	}

	#[test]
	fn test_empty_rejected() {
		let err = validate_filename("").unwrap_err();
		assert!(err.to_string().contains("empty"));
	}

	#[test]
	fn test_traversal_rejected() {
		assert!(validate_filename("..").is_err());
		assert!(validate_filename("../etc/passwd").is_err());
		assert!(validate_filename("a..b").is_err());
		assert!(validate_filename(".").is_err());
	}

	#[test]
	fn test_separators_rejected() {
		assert!(validate_filename("dir/file.txt").is_err());
		assert!(validate_filename("dir\\file.txt").is_err());
		assert!(validate_filename("/etc/passwd").is_err());
	}

	#[test]
	fn test_temp_suffix_reserved() {
		let name = format!("x{}", TEMP_SUFFIX);
		assert!(validate_filename(&name).is_err());
	}

	#[test]
	fn test_is_flat_name() {
		assert!(is_flat_name("file.txt"));
		assert!(!is_flat_name("a/b"));
		assert!(!is_flat_name(".."));
	}
}

// vim: ts=4
