//! Error types for fileserv operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::validation::ValidationError;

/// Error category reported to clients and counted server-side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Bad command syntax, bad base64, missing argument, unsafe filename
	Malformed,
	/// Verb (plain or JSON) not understood
	UnknownCommand,
	/// File missing on get/delete
	NotFound,
	/// Upload target already exists
	Conflict,
	/// Disk error on any operation
	Io,
	/// Raw request bytes could not be decoded
	Protocol,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ErrorKind::Malformed => "MALFORMED",
			ErrorKind::UnknownCommand => "UNKNOWN_COMMAND",
			ErrorKind::NotFound => "NOT_FOUND",
			ErrorKind::Conflict => "CONFLICT",
			ErrorKind::Io => "IO_FAILURE",
			ErrorKind::Protocol => "PROTOCOL_FAILURE",
		};
		write!(f, "{}", name)
	}
}

/// Main error type for request handling
#[derive(Debug)]
pub enum ServiceError {
	/// Request is syntactically wrong
	Malformed { message: String },

	/// Command verb not recognized
	UnknownCommand { command: String },

	/// File does not exist
	NotFound { filename: String },

	/// File already exists (uploads never overwrite)
	Conflict { filename: String },

	/// Underlying filesystem failure
	Io { context: String, source: io::Error },

	/// Request bytes were not valid text
	Protocol { message: String },
}

impl ServiceError {
	pub fn malformed(message: impl Into<String>) -> Self {
		ServiceError::Malformed { message: message.into() }
	}

	pub fn io(context: impl Into<String>, source: io::Error) -> Self {
		ServiceError::Io { context: context.into(), source }
	}

	/// Taxonomy tag of this error
	pub fn kind(&self) -> ErrorKind {
		match self {
			ServiceError::Malformed { .. } => ErrorKind::Malformed,
			ServiceError::UnknownCommand { .. } => ErrorKind::UnknownCommand,
			ServiceError::NotFound { .. } => ErrorKind::NotFound,
			ServiceError::Conflict { .. } => ErrorKind::Conflict,
			ServiceError::Io { .. } => ErrorKind::Io,
			ServiceError::Protocol { .. } => ErrorKind::Protocol,
		}
	}
}

impl fmt::Display for ServiceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ServiceError::Malformed { message } => write!(f, "{}", message),
			ServiceError::UnknownCommand { .. } => write!(f, "Invalid command"),
			ServiceError::NotFound { filename } => write!(f, "File not found: {}", filename),
			ServiceError::Conflict { filename } => write!(f, "File already exists: {}", filename),
			ServiceError::Io { context, source } => write!(f, "{}: {}", context, source),
			ServiceError::Protocol { message } => write!(f, "{}", message),
		}
	}
}

impl Error for ServiceError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			ServiceError::Io { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl From<ValidationError> for ServiceError {
	fn from(e: ValidationError) -> Self {
		ServiceError::Malformed { message: e.to_string() }
	}
}

impl From<base64::DecodeError> for ServiceError {
	fn from(e: base64::DecodeError) -> Self {
		ServiceError::Malformed { message: format!("Invalid base64 in filedata: {}", e) }
	}
}

impl From<std::str::Utf8Error> for ServiceError {
	fn from(_e: std::str::Utf8Error) -> Self {
		ServiceError::Protocol { message: "Invalid character encoding".to_string() }
	}
}


// vim: ts=4
