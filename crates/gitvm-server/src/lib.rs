//! HTTP read API for the GitVM receipt ledger.
//!
//! Serves the current root, the most recent receipts, and a resumable NDJSON
//! stream of raw log lines for mirrors and sync agents. The server never
//! writes receipts; it only reconciles the root pointer at startup.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::GitvmServer;
