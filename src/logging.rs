//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Listening on {}", addr);
//! warn!("No data received from {}", peer);
//! ```

pub use tracing::{debug, error, info, warn};

/// Longest command preview written to the log
pub const PREVIEW_LEN: usize = 50;

/// Initialize the tracing subscriber with environment filter support.
///
/// By default, logs at INFO level and above are displayed. Control the log level
/// with the `RUST_LOG` environment variable:
///
/// ```bash
/// RUST_LOG=debug fileserv
/// RUST_LOG=fileserv::framer=trace,fileserv::dispatch=debug fileserv 10 8000
/// ```
///
/// Output always goes to stderr: process-pool workers use stdout as their
/// data channel.
pub fn init_tracing() {
	init_tracing_with_default("info");
}

/// Same as [`init_tracing`] with a caller-chosen fallback filter.
pub fn init_tracing_with_default(default_filter: &str) {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
		)
		.with_writer(std::io::stderr)
		.try_init();
}

/// Shorten a request for logging, appending "..." when cut
pub fn preview(message: &str) -> String {
	if message.chars().count() > PREVIEW_LEN {
		let cut: String = message.chars().take(PREVIEW_LEN).collect();
		format!("{}...", cut)
	} else {
		message.to_string()
	}
}


// vim: ts=4
