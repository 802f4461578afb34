//! Typed event payloads.
//!
//! Each event `type` string maps to exactly one payload shape. Decoding goes
//! through [`Payload::decode`], which looks the `type` up in a dispatch table;
//! an unknown `type` is an error rather than an opaque blob.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// A concrete payload shape bound to one event `type`.
pub trait PayloadKind: Serialize + DeserializeOwned + Into<Payload> {
    /// The `type` discriminator stored alongside this payload.
    const TYPE: &'static str;
}

/// `git.push`: a ref moved from `before` to `after`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitPush {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub after: String,
}

/// `pr.merged`: a pull request landed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrMerged {
    pub pr_id: i64,
    pub base: String,
    pub head: String,
    pub merge_commit: String,
}

/// `release.published`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleasePublished {
    pub release_id: i64,
    pub tag: String,
    pub commit_sha: String,
}

/// `perm.changed`: a user or team gained or lost access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermChanged {
    /// `"user"` or `"team"`.
    pub subject_type: String,
    pub subject_id: i64,
    pub permission: String,
}

/// `ci.run.start`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CiRunStart {
    pub run_id: i64,
    pub workflow_id: String,
    pub commit_sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub event: String,
}

/// `ci.run.end`: same identity as the start event plus the result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CiRunEnd {
    pub run_id: i64,
    pub workflow_id: String,
    pub commit_sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub event: String,
    pub status: String,
    pub duration_ms: i64,
}

/// Event body, one variant per event `type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    GitPush(GitPush),
    PrMerged(PrMerged),
    ReleasePublished(ReleasePublished),
    PermChanged(PermChanged),
    CiRunStart(CiRunStart),
    CiRunEnd(CiRunEnd),
}

macro_rules! payload_kind {
    ($($ty:ident => $tag:literal),+ $(,)?) => {
        $(
            impl PayloadKind for $ty {
                const TYPE: &'static str = $tag;
            }

            impl From<$ty> for Payload {
                fn from(p: $ty) -> Self {
                    Payload::$ty(p)
                }
            }
        )+
    };
}

payload_kind! {
    GitPush => "git.push",
    PrMerged => "pr.merged",
    ReleasePublished => "release.published",
    PermChanged => "perm.changed",
    CiRunStart => "ci.run.start",
    CiRunEnd => "ci.run.end",
}

type Decoder = fn(Value) -> Result<Payload, serde_json::Error>;

fn decode_as<T: PayloadKind>(value: Value) -> Result<Payload, serde_json::Error> {
    serde_json::from_value::<T>(value).map(Into::into)
}

/// `type` string → payload decoder.
const DISPATCH: &[(&str, Decoder)] = &[
    (GitPush::TYPE, decode_as::<GitPush> as Decoder),
    (PrMerged::TYPE, decode_as::<PrMerged> as Decoder),
    (ReleasePublished::TYPE, decode_as::<ReleasePublished> as Decoder),
    (PermChanged::TYPE, decode_as::<PermChanged> as Decoder),
    (CiRunStart::TYPE, decode_as::<CiRunStart> as Decoder),
    (CiRunEnd::TYPE, decode_as::<CiRunEnd> as Decoder),
];

impl Payload {
    /// Every event type this build understands.
    pub fn known_types() -> impl Iterator<Item = &'static str> {
        DISPATCH.iter().map(|(tag, _)| *tag)
    }

    /// Decode a raw payload object using the `type` discriminator.
    pub fn decode(event_type: &str, value: Value) -> Result<Self, TypeError> {
        let (_, decoder) = DISPATCH
            .iter()
            .find(|(tag, _)| *tag == event_type)
            .ok_or_else(|| TypeError::UnknownEventType(event_type.to_string()))?;
        decoder(value).map_err(|e| TypeError::InvalidPayload {
            event_type: event_type.to_string(),
            reason: e.to_string(),
        })
    }

    /// The `type` discriminator for this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GitPush(_) => GitPush::TYPE,
            Self::PrMerged(_) => PrMerged::TYPE,
            Self::ReleasePublished(_) => ReleasePublished::TYPE,
            Self::PermChanged(_) => PermChanged::TYPE,
            Self::CiRunStart(_) => CiRunStart::TYPE,
            Self::CiRunEnd(_) => CiRunEnd::TYPE,
        }
    }

    /// Encode the payload body (without the discriminator) as a JSON value.
    pub fn to_value(&self) -> Result<Value, TypeError> {
        let value = match self {
            Self::GitPush(p) => serde_json::to_value(p),
            Self::PrMerged(p) => serde_json::to_value(p),
            Self::ReleasePublished(p) => serde_json::to_value(p),
            Self::PermChanged(p) => serde_json::to_value(p),
            Self::CiRunStart(p) => serde_json::to_value(p),
            Self::CiRunEnd(p) => serde_json::to_value(p),
        };
        value.map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitPush(p) => write!(
                f,
                "push {} {}..{}",
                p.git_ref,
                short(&p.before),
                short(&p.after)
            ),
            Self::PrMerged(p) => write!(f, "merge !{} {} <- {}", p.pr_id, p.base, p.head),
            Self::ReleasePublished(p) => {
                write!(f, "release {} @ {}", p.tag, short(&p.commit_sha))
            }
            Self::PermChanged(p) => write!(
                f,
                "perm {}:{} = {}",
                p.subject_type, p.subject_id, p.permission
            ),
            Self::CiRunStart(p) => write!(f, "ci start run {} ({})", p.run_id, p.workflow_id),
            Self::CiRunEnd(p) => write!(
                f,
                "ci end run {} {} in {}ms",
                p.run_id, p.status, p.duration_ms
            ),
        }
    }
}

fn short(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}
