//! Append-only receipt ledger for the GitVM audit log.
//!
//! A ledger is a directory holding three files:
//! - `receipts.jsonl`: one JSON receipt per line, append-only
//! - `ROOT.txt`: the current rolling root, replaced atomically
//! - `ledger.lock`: empty sentinel used for the exclusive writer lock
//!
//! This crate provides:
//! - [`Ledger`]: an explicit handle (directory + [`LedgerConfig`]) for every operation
//! - The write path ([`Ledger::emit`]): lock, chain, append, publish root
//! - The trust-nothing verifier ([`verify_ledger`])
//! - The lock-free cursor reader ([`Ledger::read_slice`]) for mirrors and sync agents
//! - Crash-window reconciliation of `ROOT.txt` against the log tail

pub mod config;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod reader;
pub mod recovery;
pub mod traits;
pub mod verify;

mod atomic;
mod paths;
mod tail;
mod writer;

pub use config::{LedgerConfig, SyncMode};
pub use error::{LedgerError, Result};
pub use gitvm_crypto::ChainIntegrityError;
pub use ledger::Ledger;
pub use lock::LedgerLock;
pub use reader::{SliceOptions, SliceResult};
pub use recovery::ReconcileOutcome;
pub use traits::{ReceiptReader, ReceiptWriter};
pub use verify::{verify_ledger, VerifyOutcome};
