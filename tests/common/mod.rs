//! Shared helpers for the server integration tests

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use fileserv::config::{ServerConfig, WorkerMode};
use fileserv::dispatch::{build_strategy, Dispatcher};
use fileserv::protocol::Payload;
use fileserv::{Client, StatsSnapshot};

pub struct TestServer {
	pub addr: SocketAddr,
	stop: Option<oneshot::Sender<()>>,
	handle: JoinHandle<io::Result<StatsSnapshot>>,
}

impl TestServer {
	/// Stop accepting, wait for in-flight work and return the final counters
	pub async fn stop(mut self) -> StatsSnapshot {
		if let Some(stop) = self.stop.take() {
			let _ = stop.send(());
		}
		self.handle.await.unwrap().unwrap()
	}
}

pub fn test_config(dir: &Path, mode: WorkerMode, workers: usize) -> ServerConfig {
	let mut config = ServerConfig::default();
	config.host = "127.0.0.1".to_string();
	config.port = 0;
	config.workers = workers;
	config.mode = mode;
	config.storage_dir = dir.to_path_buf();
	config.initial_timeout_ms = 1000;
	config.drain_timeout_ms = 300;
	if mode == WorkerMode::Process {
		config.worker_program = Some(PathBuf::from(env!("CARGO_BIN_EXE_fileserv")));
	}
	config
}

pub async fn start(config: &ServerConfig) -> TestServer {
	let strategy = build_strategy(config).await.unwrap();
	let dispatcher = Dispatcher::bind(config, strategy).await.unwrap();
	let addr = dispatcher.local_addr().unwrap();

	let (stop, stopped) = oneshot::channel::<()>();
	let handle = tokio::spawn(dispatcher.run_until(async move {
		let _ = stopped.await;
	}));

	TestServer { addr, stop: Some(stop), handle }
}

/// Upload `count` files named `{prefix}NN.txt` at once; all must succeed
pub async fn upload_concurrently(addr: SocketAddr, prefix: &str, count: usize) {
	let mut tasks = JoinSet::new();
	for i in 0..count {
		let client = Client::new(addr.to_string());
		let name = format!("{}{:02}.txt", prefix, i);
		tasks.spawn(async move {
			let response = client.upload(&name, format!("content of {}", name).as_bytes()).await.unwrap();
			assert!(response.is_ok(), "upload {} failed: {:?}", name, response);
		});
	}
	while let Some(result) = tasks.join_next().await {
		result.unwrap();
	}
}

/// Delete `f00..f09` while uploading `g00..g09` on interleaved connections,
/// after `f00..f19` were stored; the listing must hold exactly the survivors
pub async fn upload_and_delete_concurrently(addr: SocketAddr) {
	upload_concurrently(addr, "f", 20).await;

	let mut tasks = JoinSet::new();
	for i in 0..10 {
		let deleter = Client::new(addr.to_string());
		tasks.spawn(async move {
			let response = deleter.delete(&format!("f{:02}.txt", i)).await.unwrap();
			assert!(response.is_ok(), "delete f{:02}.txt failed: {:?}", i, response);
		});
		let uploader = Client::new(addr.to_string());
		tasks.spawn(async move {
			let response = uploader.upload(&format!("g{:02}.txt", i), b"new").await.unwrap();
			assert!(response.is_ok(), "upload g{:02}.txt failed: {:?}", i, response);
		});
	}
	while let Some(result) = tasks.join_next().await {
		result.unwrap();
	}

	let listed = Client::new(addr.to_string()).list().await.unwrap();
	let mut expected: Vec<String> = (10..20).map(|i| format!("f{:02}.txt", i)).collect();
	expected.extend((0..10).map(|i| format!("g{:02}.txt", i)));
	assert_eq!(listed.payload, Payload::Files(expected));
}

// vim: ts=4
