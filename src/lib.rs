//! # fileserv - Flat-directory file service over TCP
//!
//! Clients send one command per connection (`LIST`, `GET <name>`,
//! `DELETE <name>` as plain text, `UPLOAD` as a JSON object) and receive a
//! JSON envelope terminated by `\r\n\r\n`. Requests have no length header:
//! the server infers their end from adaptive read timeouts.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fileserv::config::ServerConfig;
//! use fileserv::dispatch::{build_strategy, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let strategy = build_strategy(&config).await?;
//!     let dispatcher = Dispatcher::bind(&config, strategy).await?;
//!     let stats = dispatcher.run().await?;
//!     println!("Served {} requests", stats.total);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod framer;
pub mod logging;
pub mod protocol;
pub mod serve;
pub mod storage;
pub mod utils;
pub mod validation;

// Re-export commonly used types and functions
pub use client::Client;
pub use config::{ServerConfig, WorkerMode};
pub use dispatch::{Dispatcher, StatsSnapshot, WorkerStrategy};
pub use error::{ErrorKind, ServiceError};
pub use protocol::{Command, Response};
pub use storage::Storage;

// vim: ts=4
