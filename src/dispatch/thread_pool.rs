//! Fixed-size pool of OS threads
//!
//! Jobs are request buffers; each worker thread runs the whole
//! decode/execute/encode step against the shared [`Storage`] and sends the
//! response back over a oneshot channel. The storage is stateless, so the
//! threads need no locking between them.

use async_trait::async_trait;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;

use super::strategy::WorkerStrategy;
use crate::error::ServiceError;
use crate::logging::*;
use crate::protocol::{self, Response};
use crate::storage::Storage;

type Reply = Result<Response, ServiceError>;

struct Job {
	request: Vec<u8>,
	reply: oneshot::Sender<Reply>,
}

pub struct ThreadPool {
	size: usize,
	sender: Mutex<Option<mpsc::Sender<Job>>>,
	handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPool {
	/// Start `size` worker threads serving `storage`
	pub fn new(storage: Storage, size: usize) -> Result<Self, ServiceError> {
		let (sender, receiver) = mpsc::channel::<Job>();
		let receiver = Arc::new(Mutex::new(receiver));

		let mut handles = Vec::with_capacity(size);
		for id in 0..size {
			let receiver = Arc::clone(&receiver);
			let storage = storage.clone();
			let handle = thread::Builder::new()
				.name(format!("fileserv-worker-{}", id))
				.spawn(move || worker_loop(id, storage, receiver))
				.map_err(|e| ServiceError::io("Cannot start worker thread", e))?;
			handles.push(handle);
		}

		Ok(ThreadPool { size, sender: Mutex::new(Some(sender)), handles: Mutex::new(handles) })
	}
}

fn worker_loop(id: usize, storage: Storage, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
	loop {
		// Lock only while taking the next job
		let job = {
			let guard = match receiver.lock() {
				Ok(g) => g,
				Err(poisoned) => poisoned.into_inner(),
			};
			guard.recv()
		};

		let job = match job {
			Ok(job) => job,
			Err(_) => {
				debug!("Worker {} exiting", id);
				return;
			}
		};

		let outcome = panic::catch_unwind(AssertUnwindSafe(|| protocol::process(&storage, &job.request)));
		let reply = outcome.unwrap_or_else(|_| {
			error!("Worker {} panicked while processing a request", id);
			Err(ServiceError::Protocol { message: "Processing error".to_string() })
		});

		// Receiver gone means the connection task was dropped
		let _ = job.reply.send(reply);
	}
}

#[async_trait]
impl WorkerStrategy for ThreadPool {
	fn name(&self) -> &'static str {
		"thread"
	}

	fn size(&self) -> usize {
		self.size
	}

	async fn execute(&self, request: Vec<u8>) -> Result<Response, ServiceError> {
		let (reply, response) = oneshot::channel();
		{
			let guard = match self.sender.lock() {
				Ok(g) => g,
				Err(poisoned) => poisoned.into_inner(),
			};
			let sender = guard.as_ref().ok_or_else(|| ServiceError::Protocol {
				message: "Server is shutting down".to_string(),
			})?;
			sender.send(Job { request, reply }).map_err(|_| ServiceError::Protocol {
				message: "Worker pool is gone".to_string(),
			})?;
		}

		response.await.unwrap_or_else(|_| {
			Err(ServiceError::Protocol { message: "Processing error".to_string() })
		})
	}

	async fn shutdown(&self) {
		// Dropping the sender ends every worker loop
		if let Ok(mut guard) = self.sender.lock() {
			guard.take();
		}
		let handles: Vec<_> = match self.handles.lock() {
			Ok(mut guard) => guard.drain(..).collect(),
			Err(_) => return,
		};
		let joined = tokio::task::spawn_blocking(move || {
			for handle in handles {
				let _ = handle.join();
			}
		})
		.await;
		if joined.is_err() {
			warn!("Worker threads did not shut down cleanly");
		}
	}
}


// vim: ts=4
