use gitvm_types::{Receipt, SCHEMA_VERSION};

use crate::hasher::{fold, receipt_hash};

/// Stamp `prev_root`, `version`, `receipt_hash` and `root` onto a receipt.
///
/// Whatever integrity fields the receipt carried are discarded.
pub fn seal(receipt: &mut Receipt, prev_root: &str) {
    receipt.version = SCHEMA_VERSION;
    receipt.prev_root = prev_root.to_string();
    receipt.receipt_hash = String::new();
    receipt.root = String::new();
    let hash = receipt_hash(receipt);
    receipt.root = fold(prev_root, &hash);
    receipt.receipt_hash = hash;
}

/// Rolling-root chain verifier.
///
/// Checks, for receipt `i` (1-based):
/// 1. `prev_root[i] == root[i-1]` (with `root[0] == ""`)
/// 2. `receipt_hash[i]` equals the hash of its canonical bytes
/// 3. `root[i] == fold(prev_root[i], receipt_hash[i])`
pub struct ChainVerifier;

impl ChainVerifier {
    /// Check one link and return the root it produces.
    pub fn check_link(
        index: u64,
        expected_prev_root: &str,
        receipt: &Receipt,
    ) -> Result<String, ChainIntegrityError> {
        if receipt.prev_root != expected_prev_root {
            return Err(ChainIntegrityError::PrevRootMismatch {
                index,
                expected: expected_prev_root.to_string(),
                actual: receipt.prev_root.clone(),
            });
        }

        let computed_hash = receipt_hash(receipt);
        if computed_hash != receipt.receipt_hash {
            return Err(ChainIntegrityError::ReceiptHashMismatch {
                index,
                expected: computed_hash,
                actual: receipt.receipt_hash.clone(),
            });
        }

        let computed_root = fold(expected_prev_root, &computed_hash);
        if computed_root != receipt.root {
            return Err(ChainIntegrityError::RootMismatch {
                index,
                expected: computed_root,
                actual: receipt.root.clone(),
            });
        }

        Ok(computed_root)
    }

    /// Verify a whole in-memory chain starting from genesis.
    ///
    /// Returns the final root, or `None` for an empty chain.
    pub fn verify_chain(receipts: &[Receipt]) -> Result<Option<String>, ChainIntegrityError> {
        let mut prev_root = String::new();
        for (i, receipt) in receipts.iter().enumerate() {
            prev_root = Self::check_link(i as u64 + 1, &prev_root, receipt)?;
        }
        Ok((!receipts.is_empty()).then_some(prev_root))
    }
}

/// A break in the hash chain or its published root pointer.
///
/// Always fatal: it means corruption or tampering, never a transient fault.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChainIntegrityError {
    #[error("receipt {index}: prev_root mismatch (expected {expected}, found {actual})")]
    PrevRootMismatch {
        index: u64,
        expected: String,
        actual: String,
    },

    #[error("receipt {index}: receipt_hash mismatch (computed {expected}, stored {actual})")]
    ReceiptHashMismatch {
        index: u64,
        expected: String,
        actual: String,
    },

    #[error("receipt {index}: root mismatch (computed {expected}, stored {actual})")]
    RootMismatch {
        index: u64,
        expected: String,
        actual: String,
    },

    #[error("root pointer mismatch (chain ends at {expected}, ROOT.txt holds {actual})")]
    RootPointerMismatch { expected: String, actual: String },

    #[error("root pointer missing (chain ends at {expected})")]
    RootPointerMissing { expected: String },
}

impl ChainIntegrityError {
    /// 1-based index of the offending receipt, when the break is in the log itself.
    pub fn index(&self) -> Option<u64> {
        match self {
            Self::PrevRootMismatch { index, .. }
            | Self::ReceiptHashMismatch { index, .. }
            | Self::RootMismatch { index, .. } => Some(*index),
            Self::RootPointerMismatch { .. } | Self::RootPointerMissing { .. } => None,
        }
    }
}
