//! Concurrency dispatcher
//!
//! Owns the listening socket. A permit from a semaphore sized to the worker
//! pool is taken *before* each `accept`, so at most `workers` connections
//! are in flight and the rest wait in the OS listen backlog. Each accepted
//! connection runs read → execute → respond → close on its own task; a
//! failure there is logged, counted and never reaches the accept loop.

pub mod process_pool;
pub mod strategy;
pub mod thread_pool;

pub use process_pool::ProcessPool;
pub use strategy::WorkerStrategy;
pub use thread_pool::ThreadPool;

use serde::Serialize;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::Semaphore;

use crate::config::{ServerConfig, WorkerMode};
use crate::error::ServiceError;
use crate::framer::{Framer, FramerConfig};
use crate::logging::*;
use crate::protocol::Response;
use crate::storage::Storage;

/// Request counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
	pub processed: u64,
	pub failed: u64,
	pub total: u64,
}

/// Processed/failed counters shared by all connection tasks
///
/// Advisory only. The lock is held for the increment and nothing else.
#[derive(Debug, Default)]
pub struct Stats {
	counters: Mutex<StatsSnapshot>,
}

impl Stats {
	pub fn record_processed(&self) {
		self.update(|c| c.processed += 1);
	}

	pub fn record_failed(&self) {
		self.update(|c| c.failed += 1);
	}

	pub fn snapshot(&self) -> StatsSnapshot {
		match self.counters.lock() {
			Ok(guard) => *guard,
			Err(poisoned) => *poisoned.into_inner(),
		}
	}

	fn update<F: FnOnce(&mut StatsSnapshot)>(&self, f: F) {
		let mut guard = match self.counters.lock() {
			Ok(g) => g,
			Err(poisoned) => poisoned.into_inner(),
		};
		f(&mut *guard);
		guard.total = guard.processed + guard.failed;
	}
}

/// Build the worker strategy selected by `config.mode`
pub async fn build_strategy(config: &ServerConfig) -> Result<Arc<dyn WorkerStrategy>, ServiceError> {
	match config.mode {
		WorkerMode::Thread => {
			let storage = Storage::open(&config.storage_dir)?;
			Ok(Arc::new(ThreadPool::new(storage, config.workers)?))
		}
		WorkerMode::Process => {
			let program = match &config.worker_program {
				Some(p) => p.clone(),
				None => std::env::current_exe()
					.map_err(|e| ServiceError::io("Cannot locate server executable", e))?,
			};
			let pool = ProcessPool::start(
				program,
				config.storage_dir.clone(),
				config.workers,
				config.worker_timeout(),
			)
			.await?;
			Ok(Arc::new(pool))
		}
	}
}

pub struct Dispatcher {
	listener: TcpListener,
	strategy: Arc<dyn WorkerStrategy>,
	framer_config: FramerConfig,
	permits: Arc<Semaphore>,
	stats: Arc<Stats>,
}

impl Dispatcher {
	/// Bind the listening socket with the configured backlog
	pub async fn bind(
		config: &ServerConfig,
		strategy: Arc<dyn WorkerStrategy>,
	) -> io::Result<Self> {
		let addr = lookup_host(config.bind_address()).await?.next().ok_or_else(|| {
			io::Error::new(io::ErrorKind::InvalidInput, format!("cannot resolve {}", config.bind_address()))
		})?;

		let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
		socket.set_reuseaddr(true)?;
		socket.bind(addr)?;
		let listener = socket.listen(config.backlog)?;

		Ok(Dispatcher {
			listener,
			permits: Arc::new(Semaphore::new(strategy.size())),
			strategy,
			framer_config: config.framer_config(),
			stats: Arc::new(Stats::default()),
		})
	}

	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	pub fn stats(&self) -> StatsSnapshot {
		self.stats.snapshot()
	}

	/// Serve until SIGINT/SIGTERM
	pub async fn run(self) -> io::Result<StatsSnapshot> {
		self.run_until(crate::utils::shutdown_signal()).await
	}

	/// Serve until `shutdown` resolves, then wait for in-flight connections
	pub async fn run_until<F>(self, shutdown: F) -> io::Result<StatsSnapshot>
	where
		F: Future<Output = ()>,
	{
		let addr = self.local_addr()?;
		info!(
			"Serving on {} with {} {} workers",
			addr,
			self.strategy.size(),
			self.strategy.name()
		);

		tokio::pin!(shutdown);
		loop {
			let permit = tokio::select! {
				_ = &mut shutdown => break,
				permit = Arc::clone(&self.permits).acquire_owned() => match permit {
					Ok(p) => p,
					Err(_) => break,
				},
			};

			let (stream, peer) = tokio::select! {
				_ = &mut shutdown => break,
				accepted = self.listener.accept() => match accepted {
					Ok(conn) => conn,
					Err(e) => {
						error!("Error accepting connection: {}", e);
						// Usually fd exhaustion; give in-flight connections time to finish
						tokio::time::sleep(Duration::from_millis(100)).await;
						continue;
					}
				},
			};
			debug!("New connection from {}", peer);

			let strategy = Arc::clone(&self.strategy);
			let stats = Arc::clone(&self.stats);
			let framer_config = self.framer_config;
			tokio::spawn(async move {
				handle_connection(stream, peer, strategy, framer_config, &stats).await;
				drop(permit);
			});
		}

		info!("Server shutting down...");
		drop(self.listener);

		// All permits back means no connection is in flight
		let in_flight = self.strategy.size() as u32;
		if let Ok(all) = self.permits.acquire_many(in_flight).await {
			drop(all);
		}
		self.strategy.shutdown().await;

		let stats = self.stats.snapshot();
		info!(
			"Requests processed: {}, failed: {}, total: {}",
			stats.processed, stats.failed, stats.total
		);
		Ok(stats)
	}
}

/// Full lifecycle of one connection
async fn handle_connection(
	stream: TcpStream,
	peer: SocketAddr,
	strategy: Arc<dyn WorkerStrategy>,
	framer_config: FramerConfig,
	stats: &Stats,
) {
	let mut framer = Framer::new(stream, framer_config);

	let request = match framer.read_request().await {
		Ok(Some(request)) => request,
		Ok(None) => {
			warn!("No data received from {}", peer);
			stats.record_failed();
			return;
		}
		Err(e) => {
			error!("Error receiving data from {}: {}", peer, e);
			stats.record_failed();
			return;
		}
	};
	info!("Processing request from {}, length: {}", peer, request.len());

	let (response, processed) = match strategy.execute(request).await {
		Ok(response) => (response, true),
		Err(e) => {
			error!("Error processing request from {}: {}", peer, e);
			(Response::from(e), false)
		}
	};

	match framer.write_response(&response).await {
		Ok(()) if processed => {
			stats.record_processed();
			info!("Successfully processed request from {}", peer);
		}
		Ok(()) => stats.record_failed(),
		Err(e) => {
			error!("Error sending response to {}: {}", peer, e);
			stats.record_failed();
		}
	}
}


// vim: ts=4
