//! Command codec
//!
//! Turns a raw request into a [`Command`] and a [`Response`] back into
//! its wire envelope. Independent of how the bytes were transported.
//!
//! ```ignore
//! use fileserv::protocol::process;
//!
//! let response = process(&storage, b"LIST")?;
//! assert_eq!(response.to_json(), r#"{"status":"OK","data":[]}"#);
//! ```

pub mod command;
pub mod response;

pub use command::{parse_command, parse_request, Command};
pub use response::{Payload, Response, Status, FALLBACK_ERROR, SENTINEL};

use crate::error::ServiceError;
use crate::logging::*;
use crate::storage::Storage;

/// Decode, execute and answer one request
///
/// Returns `Err` only when the request bytes are not text at all; every
/// other problem becomes an ERROR envelope.
pub fn process(storage: &Storage, raw: &[u8]) -> Result<Response, ServiceError> {
	debug!("Processing command: {}", preview(String::from_utf8_lossy(raw).trim()));

	let response = match parse_request(raw) {
		Ok(command) => {
			debug!("Executing {}", command.name());
			storage.execute(command)
		}
		Err(e @ ServiceError::Protocol { .. }) => return Err(e),
		Err(e) => {
			debug!("Rejected request: {}", e);
			Response::from(e)
		}
	};
	Ok(response)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use tempfile::TempDir;

	#[test]
	fn test_process_scenarios() {
		let dir = TempDir::new().unwrap();
		let storage = Storage::open(dir.path()).unwrap();

		assert_eq!(process(&storage, b"LIST").unwrap().to_json(), r#"{"status":"OK","data":[]}"#);

		let upload = br#"{"command":"UPLOAD","filename":"a.txt","filedata":"aGVsbG8="}"#;
		let resp = process(&storage, upload).unwrap();
		assert!(resp.is_ok());
		assert!(resp.message_text().unwrap().contains("a.txt"));

		let resp = process(&storage, b"GET a.txt").unwrap();
		assert_eq!(resp.payload, Payload::File { name: "a.txt".into(), content: b"hello".to_vec() });

		let resp = process(&storage, b"FOO").unwrap();
		assert_eq!(resp.to_json(), r#"{"status":"ERROR","data":"Invalid command"}"#);
	}

	#[test]
	fn test_process_rejects_binary() {
		let dir = TempDir::new().unwrap();
		let storage = Storage::open(dir.path()).unwrap();
		let err = process(&storage, &[0xc3, 0x28]).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Protocol);
	}

	#[test]
	fn test_process_parse_errors_become_envelopes() {
		let dir = TempDir::new().unwrap();
		let storage = Storage::open(dir.path()).unwrap();

		let resp = process(&storage, br#"{"command":"UPLOAD","filename":"a.txt","filedata":"@@"}"#).unwrap();
		assert!(!resp.is_ok());
		assert!(resp.message_text().unwrap().starts_with("Invalid base64"));

		let resp = process(&storage, b"GET").unwrap();
		assert_eq!(resp.to_json(), r#"{"status":"ERROR","data":"Filename required"}"#);
	}
}

// vim: ts=4
