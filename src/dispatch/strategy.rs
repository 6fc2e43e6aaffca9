//! Worker execution strategy
//!
//! The dispatcher owns sockets and framing; a strategy only turns request
//! bytes into a response. Thread and process pools implement the same
//! trait, so clients cannot tell them apart.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::protocol::Response;

#[async_trait]
pub trait WorkerStrategy: Send + Sync {
	/// Short name for logs
	fn name(&self) -> &'static str;

	/// Number of workers in the pool
	fn size(&self) -> usize;

	/// Process one assembled request
	///
	/// `Err` means the request could not be processed at all (undecodable
	/// bytes, a crashed worker); the caller answers with an ERROR envelope
	/// and counts the request as failed.
	async fn execute(&self, request: Vec<u8>) -> Result<Response, ServiceError>;

	/// Stop all workers; called once after the accept loop ends
	async fn shutdown(&self) {}
}

// vim: ts=4
