//! Response envelope
//!
//! Wire form is a single JSON object:
//!
//! ```text
//! {"status":"OK","data":["a.txt","b.txt"]}
//! {"status":"OK","data_namafile":"a.txt","data_file":"aGVsbG8="}
//! {"status":"OK","data":"File a.txt deleted"}
//! {"status":"ERROR","data":"File not found: a.txt"}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// Bytes that terminate every response on the wire
pub const SENTINEL: &[u8] = b"\r\n\r\n";

/// Sent when no proper envelope could be produced
pub const FALLBACK_ERROR: &str = r#"{"status":"ERROR","data":"Processing error"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
	Ok,
	Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
	/// Result of LIST
	Files(Vec<String>),
	/// Result of GET
	File { name: String, content: Vec<u8> },
	/// Confirmation or error cause
	Message(String),
}

/// Outcome of one command, produced once and never mutated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
	pub status: Status,
	pub payload: Payload,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
	status: Status,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	data: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	data_namafile: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	data_file: Option<String>,
}

impl Response {
	pub fn file_list(names: Vec<String>) -> Self {
		Response { status: Status::Ok, payload: Payload::Files(names) }
	}

	pub fn file(name: String, content: Vec<u8>) -> Self {
		Response { status: Status::Ok, payload: Payload::File { name, content } }
	}

	pub fn message(message: impl Into<String>) -> Self {
		Response { status: Status::Ok, payload: Payload::Message(message.into()) }
	}

	pub fn error(message: impl Into<String>) -> Self {
		Response { status: Status::Error, payload: Payload::Message(message.into()) }
	}

	pub fn is_ok(&self) -> bool {
		self.status == Status::Ok
	}

	/// Human readable message, if this response carries one
	pub fn message_text(&self) -> Option<&str> {
		match &self.payload {
			Payload::Message(m) => Some(m),
			_ => None,
		}
	}

	fn to_envelope(&self) -> Envelope {
		let mut envelope =
			Envelope { status: self.status, data: None, data_namafile: None, data_file: None };
		match &self.payload {
			Payload::Files(names) => {
				envelope.data =
					Some(Value::Array(names.iter().cloned().map(Value::String).collect()))
			}
			Payload::File { name, content } => {
				envelope.data_namafile = Some(name.clone());
				envelope.data_file = Some(STANDARD.encode(content));
			}
			Payload::Message(m) => envelope.data = Some(Value::String(m.clone())),
		}
		envelope
	}

	/// Serialize to the canonical single-line JSON envelope
	pub fn to_json(&self) -> String {
		serde_json::to_string(&self.to_envelope()).unwrap_or_else(|_| FALLBACK_ERROR.to_string())
	}

	/// Envelope followed by the sentinel, ready to write
	pub fn to_frame(&self) -> Vec<u8> {
		let mut frame = self.to_json().into_bytes();
		frame.extend_from_slice(SENTINEL);
		frame
	}

	/// Parse an envelope received from the wire (sentinel already removed)
	pub fn decode(text: &str) -> Result<Response, ServiceError> {
		let envelope: Envelope = serde_json::from_str(text.trim()).map_err(|e| {
			ServiceError::Protocol { message: format!("Invalid response envelope: {}", e) }
		})?;

		let Envelope { status, data, data_namafile, data_file } = envelope;
		let payload = match (data_namafile, data_file, data) {
			(Some(name), Some(encoded), _) => {
				let content = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
					ServiceError::Protocol { message: format!("Invalid base64 in data_file: {}", e) }
				})?;
				Payload::File { name, content }
			}
			(_, _, Some(Value::Array(items))) => {
				let mut names = Vec::with_capacity(items.len());
				for item in items {
					match item {
						Value::String(s) => names.push(s),
						other => {
							return Err(ServiceError::Protocol {
								message: format!("Unexpected list entry: {}", other),
							})
						}
					}
				}
				Payload::Files(names)
			}
			(_, _, Some(Value::String(m))) => Payload::Message(m),
			(_, _, Some(other)) => Payload::Message(other.to_string()),
			(_, _, None) => Payload::Message(String::new()),
		};

		Ok(Response { status, payload })
	}
}

impl From<ServiceError> for Response {
	fn from(e: ServiceError) -> Self {
		Response::error(e.to_string())
	}
}


// vim: ts=4
