//! Minimal client for the file service
//!
//! One request per connection: connect, send, half-close, read until the
//! sentinel.
//!
//! ```ignore
//! let client = Client::new("127.0.0.1:7777");
//! client.upload("a.txt", b"hello").await?;
//! let response = client.get("a.txt").await?;
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::ServiceError;
use crate::protocol::{Response, SENTINEL};

#[derive(Debug, Clone)]
pub struct Client {
	addr: String,
	timeout: Duration,
}

impl Client {
	pub fn new(addr: impl Into<String>) -> Self {
		Client { addr: addr.into(), timeout: Duration::from_secs(30) }
	}

	/// Send raw request bytes; returns the envelope text without the sentinel
	pub async fn send_raw(&self, request: &[u8]) -> Result<Vec<u8>, ServiceError> {
		let exchange = async {
			let mut stream = TcpStream::connect(&self.addr).await?;
			stream.write_all(request).await?;
			stream.shutdown().await?;
			read_until_sentinel(&mut stream).await
		};

		let raw = timeout(self.timeout, exchange)
			.await
			.map_err(|_| {
				ServiceError::io(
					format!("Request to {} timed out", self.addr),
					io::Error::from(io::ErrorKind::TimedOut),
				)
			})?
			.map_err(|e| ServiceError::io(format!("Connection to {} failed", self.addr), e))?;

		raw.ok_or_else(|| ServiceError::Protocol {
			message: "Connection closed before end of response".to_string(),
		})
	}

	/// Send a request and decode the response envelope
	pub async fn request(&self, request: &[u8]) -> Result<Response, ServiceError> {
		let raw = self.send_raw(request).await?;
		let text = std::str::from_utf8(&raw)?;
		Response::decode(text)
	}

	pub async fn list(&self) -> Result<Response, ServiceError> {
		self.request(b"LIST").await
	}

	pub async fn get(&self, filename: &str) -> Result<Response, ServiceError> {
		self.request(format!("GET {}", filename).as_bytes()).await
	}

	pub async fn delete(&self, filename: &str) -> Result<Response, ServiceError> {
		self.request(format!("DELETE {}", filename).as_bytes()).await
	}

	pub async fn upload(&self, filename: &str, content: &[u8]) -> Result<Response, ServiceError> {
		self.request(upload_request(filename, content).as_bytes()).await
	}
}

/// JSON upload request body
pub fn upload_request(filename: &str, content: &[u8]) -> String {
	serde_json::json!({
		"command": "UPLOAD",
		"filename": filename,
		"filedata": STANDARD.encode(content),
	})
	.to_string()
}

/// Read until [`SENTINEL`]; `None` if the peer closed first
pub async fn read_until_sentinel<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
	R: AsyncRead + Unpin,
{
	let mut received = Vec::new();
	let mut chunk = [0u8; 8192];
	loop {
		let n = reader.read(&mut chunk).await?;
		if n == 0 {
			return Ok(None);
		}
		// Only the tail can complete a sentinel split across reads
		let search_from = received.len().saturating_sub(SENTINEL.len() - 1);
		received.extend_from_slice(&chunk[..n]);
		if let Some(pos) = find(&received[search_from..], SENTINEL) {
			received.truncate(search_from + pos);
			return Ok(Some(received));
		}
	}
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack.windows(needle.len()).position(|w| w == needle)
}


// vim: ts=4
