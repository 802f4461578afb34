use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::payload::Payload;
use crate::subject::{ActorRef, RepoRef};

/// Current receipt schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// An immutable record of one platform event.
///
/// The platform fills in `repo`, `actor`, `payload` and optionally
/// `ts_unix_ms`. The ledger writer stamps `version`, `prev_root`,
/// `receipt_hash` and `root`; whatever a caller puts there is overwritten.
///
/// The event `type` is not stored separately: it is always the payload's
/// discriminator, see [`Receipt::event_type`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredReceipt", into = "StoredReceipt")]
pub struct Receipt {
    pub version: u32,
    /// Milliseconds since the UNIX epoch. Zero means "assign at emit time".
    pub ts_unix_ms: i64,
    pub repo: RepoRef,
    pub actor: ActorRef,
    pub payload: Payload,
    /// Rolling root before this receipt (empty for the first receipt).
    pub prev_root: String,
    /// Hash of this receipt's canonical bytes.
    pub receipt_hash: String,
    /// Rolling root after folding in this receipt.
    pub root: String,
}

impl Receipt {
    /// Create an unsealed receipt for a platform event.
    pub fn new(repo: RepoRef, actor: ActorRef, payload: impl Into<Payload>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            ts_unix_ms: 0,
            repo,
            actor,
            payload: payload.into(),
            prev_root: String::new(),
            receipt_hash: String::new(),
            root: String::new(),
        }
    }

    /// Set an explicit event timestamp.
    pub fn with_timestamp(mut self, ts_unix_ms: i64) -> Self {
        self.ts_unix_ms = ts_unix_ms;
        self
    }

    /// The `type` discriminator, e.g. `"git.push"`.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Returns `true` once the writer has stamped the integrity fields.
    pub fn is_sealed(&self) -> bool {
        !self.receipt_hash.is_empty() && !self.root.is_empty()
    }

    /// Short form of the root for display (tag plus first 12 hex chars).
    pub fn short_root(&self) -> &str {
        self.root.get(..15).unwrap_or(&self.root)
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} by {}: {}",
            self.short_root(),
            self.event_type(),
            self.repo.full,
            self.actor,
            self.payload
        )
    }
}

/// On-disk JSON shape of a receipt.
///
/// The payload is kept as a raw value here and decoded through the `type`
/// dispatch table in [`Payload::decode`]. Unknown keys are rejected at every
/// level: the hash covers only the typed fields, so an extra key would be
/// invisible to verification.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredReceipt {
    #[serde(default)]
    version: u32,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    ts_unix_ms: i64,
    repo: RepoRef,
    actor: ActorRef,
    payload: Value,
    #[serde(default)]
    prev_root: String,
    #[serde(default)]
    receipt_hash: String,
    #[serde(default)]
    root: String,
}

impl TryFrom<StoredReceipt> for Receipt {
    type Error = TypeError;

    fn try_from(stored: StoredReceipt) -> Result<Self, Self::Error> {
        let payload = Payload::decode(&stored.event_type, stored.payload)?;
        Ok(Self {
            version: stored.version,
            ts_unix_ms: stored.ts_unix_ms,
            repo: stored.repo,
            actor: stored.actor,
            payload,
            prev_root: stored.prev_root,
            receipt_hash: stored.receipt_hash,
            root: stored.root,
        })
    }
}

impl From<Receipt> for StoredReceipt {
    fn from(receipt: Receipt) -> Self {
        let event_type = receipt.event_type().to_string();
        // Payload structs hold only strings and integers, so this cannot fail.
        let payload = receipt.payload.to_value().unwrap_or(Value::Null);
        Self {
            version: receipt.version,
            event_type,
            ts_unix_ms: receipt.ts_unix_ms,
            repo: receipt.repo,
            actor: receipt.actor,
            payload,
            prev_root: receipt.prev_root,
            receipt_hash: receipt.receipt_hash,
            root: receipt.root,
        }
    }
}
