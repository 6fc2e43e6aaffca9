//! Fixed-size pool of worker processes
//!
//! Each worker is a child `fileserv worker <dir>` speaking the line protocol
//! of [`crate::serve`]. A worker handles one request at a time; a worker
//! that dies or stops answering is killed and replaced on next use, so a
//! crash only costs the request it was handling.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;

use super::strategy::WorkerStrategy;
use crate::error::ServiceError;
use crate::logging::*;
use crate::protocol::Response;
use crate::serve::{encode_request_line, ERR_PREFIX, OK_PREFIX, READY_LINE};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// One running child process
struct WorkerProcess {
	id: usize,
	child: Child,
	stdin: ChildStdin,
	stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
	async fn spawn(id: usize, program: &Path, storage_dir: &Path) -> io::Result<Self> {
		let mut child = Command::new(program)
			.arg("worker")
			.arg(storage_dir)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "worker stdin unavailable"))?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| io::Error::new(io::ErrorKind::Other, "worker stdout unavailable"))?;

		let mut worker = WorkerProcess { id, child, stdin, stdout: BufReader::new(stdout) };

		let mut line = String::new();
		let n = timeout(STARTUP_TIMEOUT, worker.stdout.read_line(&mut line))
			.await
			.map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "worker did not start"))??;
		if n == 0 || line.trim() != READY_LINE {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("unexpected worker greeting: {:?}", line.trim()),
			));
		}

		debug!("Worker process {} started (pid {:?})", id, worker.child.id());
		Ok(worker)
	}

	/// Send one request. `Err` means the worker itself is broken.
	async fn request(&mut self, raw: &[u8]) -> io::Result<Result<Response, ServiceError>> {
		self.stdin.write_all(encode_request_line(raw).as_bytes()).await?;
		self.stdin.flush().await?;

		let mut line = String::new();
		if self.stdout.read_line(&mut line).await? == 0 {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "worker exited"));
		}
		let line = line.trim_end_matches(&['\r', '\n'][..]);

		if let Some(json) = line.strip_prefix(OK_PREFIX) {
			Ok(Response::decode(json))
		} else if let Some(message) = line.strip_prefix(ERR_PREFIX) {
			Ok(Err(ServiceError::Protocol { message: message.to_string() }))
		} else {
			Err(io::Error::new(io::ErrorKind::InvalidData, format!("unexpected worker reply: {:?}", line)))
		}
	}

	/// Close stdin and wait briefly; kill if it does not exit
	async fn stop(mut self) {
		let _ = timeout(EXIT_TIMEOUT, self.stdin.shutdown()).await;
		drop(self.stdin);
		match timeout(EXIT_TIMEOUT, self.child.wait()).await {
			Ok(Ok(status)) => debug!("Worker process {} exited: {}", self.id, status),
			_ => {
				let _ = self.child.kill().await;
				debug!("Worker process {} killed", self.id);
			}
		}
	}
}

fn processing_error() -> ServiceError {
	ServiceError::Protocol { message: "Processing error".to_string() }
}

pub struct ProcessPool {
	program: PathBuf,
	storage_dir: PathBuf,
	size: usize,
	request_timeout: Duration,
	permits: Semaphore,
	idle: Mutex<Vec<WorkerProcess>>,
	next_id: AtomicUsize,
}

impl ProcessPool {
	/// Start `size` worker processes running `program`
	pub async fn start(
		program: PathBuf,
		storage_dir: PathBuf,
		size: usize,
		request_timeout: Duration,
	) -> Result<Self, ServiceError> {
		let pool = ProcessPool {
			program,
			storage_dir,
			size,
			request_timeout,
			permits: Semaphore::new(size),
			idle: Mutex::new(Vec::with_capacity(size)),
			next_id: AtomicUsize::new(0),
		};

		let mut started = Vec::with_capacity(size);
		for _ in 0..size {
			started.push(pool.spawn_worker().await?);
		}
		*pool.idle.lock().await = started;

		info!("Started {} worker processes ({})", size, pool.program.display());
		Ok(pool)
	}

	async fn spawn_worker(&self) -> Result<WorkerProcess, ServiceError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		WorkerProcess::spawn(id, &self.program, &self.storage_dir).await.map_err(|e| {
			ServiceError::io(format!("Cannot start worker process {}", self.program.display()), e)
		})
	}
}

#[async_trait]
impl WorkerStrategy for ProcessPool {
	fn name(&self) -> &'static str {
		"process"
	}

	fn size(&self) -> usize {
		self.size
	}

	async fn execute(&self, request: Vec<u8>) -> Result<Response, ServiceError> {
		let _permit = self.permits.acquire().await.map_err(|_| ServiceError::Protocol {
			message: "Server is shutting down".to_string(),
		})?;

		let idle_worker = self.idle.lock().await.pop();
		let mut worker = match idle_worker {
			Some(w) => w,
			None => match self.spawn_worker().await {
				Ok(w) => w,
				Err(e) => {
					// Cause goes to the log only
					error!("{}", e);
					return Err(processing_error());
				}
			},
		};

		match timeout(self.request_timeout, worker.request(&request)).await {
			Ok(Ok(reply)) => {
				self.idle.lock().await.push(worker);
				reply
			}
			Ok(Err(e)) => {
				error!("Worker process {} failed: {}", worker.id, e);
				worker.stop().await;
				Err(processing_error())
			}
			Err(_) => {
				error!("Worker process {} timed out", worker.id);
				worker.stop().await;
				Err(processing_error())
			}
		}
	}

	async fn shutdown(&self) {
		self.permits.close();
		let workers: Vec<WorkerProcess> = self.idle.lock().await.drain(..).collect();
		for worker in workers {
			worker.stop().await;
		}
	}
}

// vim: ts=4
