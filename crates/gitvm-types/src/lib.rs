//! Record model for the GitVM audit ledger.
//!
//! Every ledger crate depends on `gitvm-types`. The types here are pure data:
//! they know how to (de)serialize themselves and nothing else. Hashing lives
//! in `gitvm-crypto`, persistence in `gitvm-ledger`.
//!
//! # Key Types
//!
//! - [`Receipt`]: One immutable platform event plus its chain integrity fields
//! - [`Payload`]: Typed event body, one variant per event `type`
//! - [`RepoRef`] / [`ActorRef`]: Who did what, where

pub mod error;
pub mod payload;
pub mod receipt;
pub mod subject;

pub use error::TypeError;
pub use payload::{
    CiRunEnd, CiRunStart, GitPush, Payload, PayloadKind, PermChanged, PrMerged, ReleasePublished,
};
pub use receipt::{Receipt, SCHEMA_VERSION};
pub use subject::{ActorRef, RepoRef};
