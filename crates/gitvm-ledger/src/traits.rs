use gitvm_types::Receipt;

use crate::error::LedgerError;
use crate::reader::{SliceOptions, SliceResult};

/// Write boundary for receipt producers.
pub trait ReceiptWriter: Send + Sync {
    /// Chain and durably append one receipt, returning it as stored.
    fn emit(&self, receipt: Receipt) -> Result<Receipt, LedgerError>;
}

/// Read boundary for mirrors, dashboards and sync agents.
pub trait ReceiptReader: Send + Sync {
    fn get_root(&self) -> Result<String, LedgerError>;

    fn read_receipts(&self) -> Result<Vec<Receipt>, LedgerError>;

    fn read_slice(&self, options: &SliceOptions) -> Result<SliceResult, LedgerError>;

    fn recent(&self, n: usize) -> Result<Vec<Receipt>, LedgerError>;
}
