//! Request parsing
//!
//! Two stages with a fixed precedence:
//! 1. a JSON object carrying a `command` key is a JSON request
//! 2. everything else is a plain `<VERB> [<ARG>]` line
//!
//! Stage 1 wins even when the text would also read as a plain command.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ServiceError;

/// One parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	List,
	Get(String),
	Upload { filename: String, data: Vec<u8> },
	Delete(String),
}

impl Command {
	/// Upper-case verb, for logging
	pub fn name(&self) -> &'static str {
		match self {
			Command::List => "LIST",
			Command::Get(_) => "GET",
			Command::Upload { .. } => "UPLOAD",
			Command::Delete(_) => "DELETE",
		}
	}
}

/// JSON request body; unknown keys are ignored
#[derive(Debug, Deserialize)]
struct JsonRequest {
	command: String,
	#[serde(default)]
	filename: Option<String>,
	#[serde(default)]
	filedata: Option<String>,
}

/// Parse raw request bytes
///
/// Bytes that are not UTF-8 yield a `Protocol` error; everything else is
/// handled by [`parse_command`].
pub fn parse_request(raw: &[u8]) -> Result<Command, ServiceError> {
	let text = std::str::from_utf8(raw)?;
	parse_command(text)
}

/// Parse a request that is already text
pub fn parse_command(text: &str) -> Result<Command, ServiceError> {
	let text = text.trim();
	match json_envelope(text) {
		Some(envelope) => parse_json(envelope),
		None => parse_plain(text),
	}
}

/// Stage 1 classifier: a JSON object with a `command` key
fn json_envelope(text: &str) -> Option<Map<String, Value>> {
	if !text.starts_with('{') {
		return None;
	}
	match serde_json::from_str::<Value>(text) {
		Ok(Value::Object(map)) if map.contains_key("command") => Some(map),
		_ => None,
	}
}

fn parse_json(envelope: Map<String, Value>) -> Result<Command, ServiceError> {
	let request: JsonRequest = serde_json::from_value(Value::Object(envelope))
		.map_err(|e| ServiceError::malformed(format!("Invalid JSON request: {}", e)))?;

	let filename = request.filename.unwrap_or_default().trim().to_string();
	match request.command.to_lowercase().as_str() {
		"upload" => {
			let filedata = match request.filedata {
				Some(data) if !filename.is_empty() => data,
				_ => {
					return Err(ServiceError::malformed(
						"Incomplete parameters: filename and filedata are required",
					))
				}
			};
			// MIME-style line wrapping is tolerated
			let compact: String = filedata.chars().filter(|c| !c.is_ascii_whitespace()).collect();
			let data = STANDARD.decode(compact.as_bytes())?;
			Ok(Command::Upload { filename, data })
		}
		"list" => Ok(Command::List),
		"get" => Ok(Command::Get(require_filename(filename)?)),
		"delete" => Ok(Command::Delete(require_filename(filename)?)),
		_ => Err(ServiceError::UnknownCommand { command: request.command }),
	}
}

fn parse_plain(text: &str) -> Result<Command, ServiceError> {
	let mut parts = text.splitn(2, char::is_whitespace);
	let verb = parts.next().unwrap_or("").to_lowercase();
	let arg = parts.next().unwrap_or("").trim().to_string();

	match verb.as_str() {
		"list" => Ok(Command::List),
		"get" => Ok(Command::Get(require_filename(arg)?)),
		"delete" => Ok(Command::Delete(require_filename(arg)?)),
		"upload" => Err(ServiceError::malformed("Plain-text UPLOAD is not supported, use the JSON format")),
		_ => Err(ServiceError::UnknownCommand { command: verb }),
	}
}

fn require_filename(filename: String) -> Result<String, ServiceError> {
	if filename.is_empty() {
		return Err(ServiceError::malformed("Filename required"));
	}
	Ok(filename)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;

	#[test]
	fn test_plain_list_case_insensitive() {
		assert_eq!(parse_command("LIST").unwrap(), Command::List);
		assert_eq!(parse_command("list").unwrap(), Command::List);
		assert_eq!(parse_command("  LiSt \r\n").unwrap(), Command::List);
	}

	#[test]
	fn test_plain_get_and_delete() {
		assert_eq!(parse_command("GET a.txt").unwrap(), Command::Get("a.txt".into()));
		assert_eq!(parse_command("delete  b.txt ").unwrap(), Command::Delete("b.txt".into()));
	}

	#[test]
	fn test_plain_argument_keeps_inner_spaces() {
		assert_eq!(parse_command("GET my file.txt").unwrap(), Command::Get("my file.txt".into()));
	}

	#[test]
	fn test_missing_argument_is_malformed() {
		assert_eq!(parse_command("GET").unwrap_err().kind(), ErrorKind::Malformed);
		assert_eq!(parse_command("DELETE   ").unwrap_err().kind(), ErrorKind::Malformed);
	}

	#[test]
	fn test_unknown_verb() {
		let err = parse_command("FOO bar").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::UnknownCommand);
		assert_eq!(err.to_string(), "Invalid command");
		assert_eq!(parse_command("").unwrap_err().kind(), ErrorKind::UnknownCommand);
	}

	#[test]
	fn test_plain_upload_is_rejected() {
		assert_eq!(parse_command("UPLOAD a.txt aGVsbG8=").unwrap_err().kind(), ErrorKind::Malformed);
	}

	#[test]
	fn test_json_upload() {
		let cmd =
			parse_command(r#"{"command":"UPLOAD","filename":"a.txt","filedata":"aGVsbG8="}"#).unwrap();
		assert_eq!(cmd, Command::Upload { filename: "a.txt".into(), data: b"hello".to_vec() });
	}

	#[test]
	fn test_json_upload_bad_base64_names_field() {
		let err = parse_command(r#"{"command":"upload","filename":"a.txt","filedata":"!!!"}"#)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Malformed);
		assert!(err.to_string().contains("filedata"));
	}

	#[test]
	fn test_json_upload_incomplete() {
		let err = parse_command(r#"{"command":"UPLOAD","filedata":"aGVsbG8="}"#).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Malformed);
		let err = parse_command(r#"{"command":"UPLOAD","filename":"a.txt"}"#).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Malformed);
	}

	#[test]
	fn test_json_other_commands() {
		assert_eq!(parse_command(r#"{"command":"list"}"#).unwrap(), Command::List);
		assert_eq!(
			parse_command(r#"{"command":"GET","filename":"x.bin"}"#).unwrap(),
			Command::Get("x.bin".into())
		);
		let err = parse_command(r#"{"command":"RENAME"}"#).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::UnknownCommand);
	}

	#[test]
	fn test_json_without_command_key_falls_back_to_plain() {
		// Not a JSON request, and `{"x":1}` is not a verb either
		let err = parse_command(r#"{"x":1}"#).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::UnknownCommand);
	}

	#[test]
	fn test_truncated_json_is_not_json() {
		let err = parse_command(r#"{"command":"UPLOAD","filename":"a"#).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::UnknownCommand);
	}

	#[test]
	fn test_non_string_command_is_malformed() {
		let err = parse_command(r#"{"command":42}"#).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Malformed);
	}

	#[test]
	fn test_invalid_utf8_is_protocol_error() {
		let err = parse_request(&[0x47, 0x45, 0x54, 0x20, 0xff, 0xfe]).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Protocol);
		assert_eq!(err.to_string(), "Invalid character encoding");
	}

	#[test]
	fn test_upload_accepts_wrapped_base64() {
		let cmd = parse_command(r#"{"command":"UPLOAD","filename":"a.txt","filedata":"aGVs\r\nbG8=\n"}"#)
			.unwrap();
		assert_eq!(cmd, Command::Upload { filename: "a.txt".into(), data: b"hello".to_vec() });
	}
}

// vim: ts=4
