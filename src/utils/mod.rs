//! Utility modules for common functionality

pub mod shutdown;

pub use shutdown::shutdown_signal;

// vim: ts=4
