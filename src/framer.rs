//! Connection framing
//!
//! Requests carry no length header. The end of a request is inferred:
//!
//! - `AwaitingData`: wait up to the initial timeout for the first bytes
//! - `Draining`: after the first bytes, every further read gets the much
//!   shorter drain timeout; a timed out read or EOF completes the request
//! - `TimedOutEmpty`: nothing arrived before the initial timeout, the
//!   session is dropped without a response
//!
//! Responses are the JSON envelope followed by [`crate::protocol::SENTINEL`].

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::logging::*;
use crate::protocol::Response;

/// Timeouts and buffer size of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
	pub initial_timeout: Duration,
	pub drain_timeout: Duration,
	pub read_buffer_size: usize,
	pub write_timeout: Duration,
}

impl Default for FramerConfig {
	fn default() -> Self {
		FramerConfig {
			initial_timeout: Duration::from_secs(5),
			drain_timeout: Duration::from_millis(500),
			read_buffer_size: 8192,
			write_timeout: Duration::from_secs(30),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
	AwaitingData,
	Draining,
	Complete,
	TimedOutEmpty,
	Closed,
}

/// One accepted connection: receive buffer plus adaptive deadline
pub struct Framer<S> {
	stream: S,
	config: FramerConfig,
	state: FrameState,
	buffer: Vec<u8>,
}

impl<S> Framer<S>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	pub fn new(stream: S, config: FramerConfig) -> Self {
		Framer { stream, config, state: FrameState::AwaitingData, buffer: Vec::new() }
	}

	pub fn state(&self) -> FrameState {
		self.state
	}

	/// Assemble one request
	///
	/// `Ok(None)` means the peer sent nothing (timeout or immediate EOF) and
	/// must not get a response.
	pub async fn read_request(&mut self) -> io::Result<Option<Vec<u8>>> {
		let mut chunk = vec![0u8; self.config.read_buffer_size.max(1)];

		loop {
			let deadline = match self.state {
				FrameState::AwaitingData => self.config.initial_timeout,
				FrameState::Draining => self.config.drain_timeout,
				_ => break,
			};

			match timeout(deadline, self.stream.read(&mut chunk)).await {
				Ok(Ok(0)) => {
					// Peer half-closed its write side
					self.state = if self.buffer.is_empty() {
						FrameState::Closed
					} else {
						FrameState::Complete
					};
				}
				Ok(Ok(n)) => {
					self.buffer.extend_from_slice(&chunk[..n]);
					self.state = FrameState::Draining;
				}
				Ok(Err(e)) => {
					self.state = FrameState::Closed;
					return Err(e);
				}
				Err(_elapsed) => {
					self.state = if self.buffer.is_empty() {
						FrameState::TimedOutEmpty
					} else {
						FrameState::Complete
					};
				}
			}
		}

		match self.state {
			FrameState::Complete => {
				debug!("Request assembled, {} bytes", self.buffer.len());
				Ok(Some(std::mem::take(&mut self.buffer)))
			}
			FrameState::TimedOutEmpty => {
				self.state = FrameState::Closed;
				Ok(None)
			}
			_ => Ok(None),
		}
	}

	/// Write a response envelope plus sentinel and close our side
	pub async fn write_response(&mut self, response: &Response) -> io::Result<()> {
		let frame = response.to_frame();
		let stream = &mut self.stream;
		let result = timeout(self.config.write_timeout, async {
			stream.write_all(&frame).await?;
			stream.flush().await
		})
		.await
		.unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "response write timed out")));

		let _ = self.stream.shutdown().await;
		self.state = FrameState::Closed;
		result
	}
}


// vim: ts=4
