//! Server configuration
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (ServerConfig::default())
//! 2. Config file (`--config`, TOML or JSON5)
//! 3. Environment variables (FILESERV_* prefix)
//! 4. CLI arguments (highest priority)

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::framer::FramerConfig;
use crate::validation::{
	validate_timeout_ms, validate_timeout_order, validate_workers, ValidationError, Validator,
};

/// How accepted connections are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerMode {
	/// Fixed set of worker threads inside the server process
	#[default]
	Thread,
	/// Fixed set of child processes, one request at a time each
	Process,
}

impl FromStr for WorkerMode {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"thread" | "threads" => Ok(WorkerMode::Thread),
			"process" | "processes" => Ok(WorkerMode::Process),
			other => Err(ValidationError::ConfigError(format!(
				"unknown worker mode '{}' (expected thread or process)",
				other
			))),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
	// ========================================================================
	// LISTENER
	// ========================================================================
	/// Bind address
	pub host: String,

	/// Listen port (0 picks a free one)
	pub port: u16,

	/// OS listen backlog; excess connections wait here
	pub backlog: u32,

	// ========================================================================
	// WORKERS
	// ========================================================================
	/// Pool size, also the bound on concurrent connections
	pub workers: usize,

	/// Thread or process pool
	pub mode: WorkerMode,

	/// Program spawned for process workers (defaults to the running binary)
	pub worker_program: Option<PathBuf>,

	/// Longest a process worker may spend on one request
	pub worker_timeout_ms: u64,

	// ========================================================================
	// STORAGE
	// ========================================================================
	/// Flat directory holding the files; must exist
	pub storage_dir: PathBuf,

	// ========================================================================
	// FRAMING
	// ========================================================================
	/// Wait for the first bytes of a request
	pub initial_timeout_ms: u64,

	/// Wait for further bytes once a request has started
	pub drain_timeout_ms: u64,

	/// Bytes requested per read
	pub read_buffer_size: usize,

	/// Bound on flushing a response
	pub write_timeout_ms: u64,
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig {
			host: "0.0.0.0".to_string(),
			port: 7777,
			backlog: 100,

			workers: 5,
			mode: WorkerMode::Thread,
			worker_program: None,
			worker_timeout_ms: 60_000,

			storage_dir: PathBuf::from("files"),

			initial_timeout_ms: 5_000,
			drain_timeout_ms: 500,
			read_buffer_size: 8192,
			write_timeout_ms: 30_000,
		}
	}
}

impl ServerConfig {
	/// Load a config file; `.toml` is TOML, anything else JSON5
	pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
		let contents = fs::read_to_string(path)
			.map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
		let is_toml = path.extension().map(|ext| ext == "toml").unwrap_or(false);
		let config: ServerConfig = if is_toml {
			toml::from_str(&contents)
				.map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
		} else {
			json5::from_str(&contents)
				.map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
		};
		Ok(config)
	}

	/// Apply FILESERV_* overrides from the process environment
	pub fn apply_env(&mut self) -> Result<(), ValidationError> {
		self.apply_vars(|key| std::env::var(key).ok())
	}

	/// Apply FILESERV_* overrides from any lookup (testable without touching the environment)
	pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ValidationError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(host) = lookup("FILESERV_HOST") {
			self.host = host;
		}
		if let Some(port) = lookup("FILESERV_PORT") {
			self.port = parse_var("FILESERV_PORT", &port)?;
		}
		if let Some(workers) = lookup("FILESERV_WORKERS") {
			self.workers = parse_var("FILESERV_WORKERS", &workers)?;
		}
		if let Some(mode) = lookup("FILESERV_MODE") {
			self.mode = mode.parse()?;
		}
		if let Some(dir) = lookup("FILESERV_DIR") {
			self.storage_dir = PathBuf::from(dir);
		}
		Ok(())
	}

	pub fn bind_address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub fn framer_config(&self) -> FramerConfig {
		FramerConfig {
			initial_timeout: Duration::from_millis(self.initial_timeout_ms),
			drain_timeout: Duration::from_millis(self.drain_timeout_ms),
			read_buffer_size: self.read_buffer_size,
			write_timeout: Duration::from_millis(self.write_timeout_ms),
		}
	}

	pub fn worker_timeout(&self) -> Duration {
		Duration::from_millis(self.worker_timeout_ms)
	}
}

impl Validator for ServerConfig {
	fn validate(&self) -> Result<(), ValidationError> {
		validate_workers(self.workers)?;
		validate_timeout_ms("initialTimeoutMs", self.initial_timeout_ms)?;
		validate_timeout_ms("drainTimeoutMs", self.drain_timeout_ms)?;
		validate_timeout_ms("writeTimeoutMs", self.write_timeout_ms)?;
		validate_timeout_ms("workerTimeoutMs", self.worker_timeout_ms)?;
		validate_timeout_order(self.initial_timeout_ms, self.drain_timeout_ms)?;
		if self.read_buffer_size == 0 {
			return Err(ValidationError::ConfigError(
				"readBufferSize must be greater than 0".to_string(),
			));
		}
		if self.backlog == 0 {
			return Err(ValidationError::ConfigError("backlog must be greater than 0".to_string()));
		}
		if !self.storage_dir.is_dir() {
			return Err(ValidationError::ConfigError(format!(
				"storage directory {} does not exist",
				self.storage_dir.display()
			)));
		}
		Ok(())
	}
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ValidationError> {
	value
		.trim()
		.parse()
		.map_err(|_| ValidationError::ConfigError(format!("{}: invalid value '{}'", key, value)))
}


// vim: ts=4
