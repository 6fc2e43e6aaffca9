//! Signal handling for graceful termination

use tracing::{debug, warn};

/// Resolves on SIGINT or SIGTERM
///
/// If the Unix handlers cannot be installed, falls back to Ctrl-C only.
pub async fn shutdown_signal() {
	use tokio::signal;

	let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Only Ctrl-C will stop the server.", e);
			let _ = signal::ctrl_c().await;
			return;
		}
	};

	let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGINT handler: {}. Only SIGTERM will stop the server.", e);
			sigterm.recv().await;
			return;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => debug!("Received SIGTERM, shutting down..."),
		_ = sigint.recv() => debug!("Received SIGINT, shutting down..."),
	}
}

// vim: ts=4
