//! Canonical hashing for the GitVM audit ledger.
//!
//! Provides the byte-exact canonical encoding of a receipt, the tagged
//! BLAKE3 hash used for receipt hashes and rolling roots, and an in-memory
//! hash chain verifier. Both the ledger writer and the verifier go through
//! this crate, so the two can never disagree on what gets hashed.

pub mod canonical;
pub mod chain;
pub mod hasher;

pub use canonical::{canonical_bytes, Canonical, CanonicalEncoder};
pub use chain::{seal, ChainIntegrityError, ChainVerifier};
pub use hasher::{fold, hash_bytes, is_tagged_hash, receipt_hash, HASH_TAG};
