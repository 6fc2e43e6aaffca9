//! Process-pool worker side
//!
//! A worker process is the same binary started as `fileserv worker <dir>`.
//! It talks to the dispatcher over stdin/stdout with one line per message:
//!
//! ```text
//! worker → READY
//! parent → <base64 of raw request bytes>
//! worker → OK {"status":"OK","data":[]}
//! parent → <base64 ...>
//! worker → ERR Invalid character encoding
//! ```
//!
//! EOF on stdin ends the worker. Logs go to stderr.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::error::Error;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::logging::*;
use crate::protocol;
use crate::storage::Storage;

/// Announced once the worker can take requests
pub const READY_LINE: &str = "READY";
/// Prefix of a reply carrying a response envelope
pub const OK_PREFIX: &str = "OK ";
/// Prefix of a reply for a request that could not be processed
pub const ERR_PREFIX: &str = "ERR ";

/// Encode raw request bytes as one request line (newline included)
pub fn encode_request_line(raw: &[u8]) -> String {
	let mut line = STANDARD.encode(raw);
	line.push('\n');
	line
}

fn error_line(message: &str) -> String {
	format!("{}{}\n", ERR_PREFIX, message.replace(['\r', '\n'], " "))
}

/// Answer request lines from `reader` until EOF
pub async fn run_worker<R, W>(storage: &Storage, mut reader: R, mut writer: W) -> std::io::Result<()>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin,
{
	writer.write_all(format!("{}\n", READY_LINE).as_bytes()).await?;
	writer.flush().await?;

	let mut line = String::new();
	loop {
		line.clear();
		let n = reader.read_line(&mut line).await?;
		if n == 0 {
			debug!("Worker input closed");
			return Ok(());
		}

		let trimmed = line.trim();
		if trimmed.is_empty() {
			continue;
		}

		let reply = match STANDARD.decode(trimmed) {
			Ok(raw) => match protocol::process(storage, &raw) {
				Ok(response) => format!("{}{}\n", OK_PREFIX, response.to_json()),
				Err(e) => error_line(&e.to_string()),
			},
			Err(e) => {
				warn!("Undecodable request line: {}", e);
				error_line(&format!("Bad request line: {}", e))
			}
		};

		writer.write_all(reply.as_bytes()).await?;
		writer.flush().await?;
	}
}

/// Entry point of `fileserv worker <dir>`
pub async fn serve_worker(dir: &Path) -> Result<(), Box<dyn Error>> {
	let storage = Storage::open(dir)?;
	debug!("Worker {} serving {}", std::process::id(), dir.display());

	let reader = BufReader::new(tokio::io::stdin());
	let writer = tokio::io::stdout();
	run_worker(&storage, reader, writer).await?;
	Ok(())
}


// vim: ts=4
