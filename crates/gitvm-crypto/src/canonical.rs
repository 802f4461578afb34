//! Byte-exact canonical encoding of receipts.
//!
//! The hash chain is only portable if every implementation feeds identical
//! bytes into the hash, so the encoding is written out here field by field
//! instead of being left to a serializer's defaults.
//!
//! # Contract
//!
//! Compact JSON, no whitespace anywhere. Keys appear in exactly this order:
//!
//! ```text
//! version, type, ts_unix_ms,
//! repo { id, full },
//! actor { id, username },
//! payload { <variant fields in declaration order> },
//! prev_root, receipt_hash, root
//! ```
//!
//! `receipt_hash` and `root` are always encoded as `""`.
//!
//! - Integers: base 10, optional leading `-`, no leading zeros.
//! - Strings: `"` and `\` are backslash-escaped; `\b \f \n \r \t` use their
//!   short forms; other bytes below `0x20` become `\u00xx` (lowercase hex);
//!   everything else, including non-ASCII, is emitted as raw UTF-8.
//!
//! Payload field order per type:
//!
//! | type                | fields                                                     |
//! |---------------------|------------------------------------------------------------|
//! | `git.push`          | ref, before, after                                         |
//! | `pr.merged`         | pr_id, base, head, merge_commit                            |
//! | `release.published` | release_id, tag, commit_sha                                |
//! | `perm.changed`      | subject_type, subject_id, permission                       |
//! | `ci.run.start`      | run_id, workflow_id, commit_sha, ref, event                |
//! | `ci.run.end`        | run_id, workflow_id, commit_sha, ref, event, status, duration_ms |

use gitvm_types::{
    ActorRef, CiRunEnd, CiRunStart, GitPush, Payload, PermChanged, PrMerged, Receipt,
    ReleasePublished, RepoRef,
};

/// Types with a fixed canonical encoding.
pub trait Canonical {
    fn encode(&self, enc: &mut CanonicalEncoder);
}

/// Append-only writer for canonical bytes.
#[derive(Default)]
pub struct CanonicalEncoder {
    buf: Vec<u8>,
    /// Whether the current object already has a member (needs a comma).
    has_member: Vec<bool>,
}

impl CanonicalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn begin_object(&mut self) {
        self.buf.push(b'{');
        self.has_member.push(false);
    }

    pub fn end_object(&mut self) {
        self.has_member.pop();
        self.buf.push(b'}');
    }

    pub fn field_str(&mut self, key: &str, value: &str) {
        self.key(key);
        self.string(value);
    }

    pub fn field_int(&mut self, key: &str, value: i64) {
        self.key(key);
        self.buf.extend_from_slice(value.to_string().as_bytes());
    }

    pub fn field_uint(&mut self, key: &str, value: u64) {
        self.key(key);
        self.buf.extend_from_slice(value.to_string().as_bytes());
    }

    /// Write a key whose value is a nested canonical object.
    pub fn field_object(&mut self, key: &str, value: &impl Canonical) {
        self.key(key);
        value.encode(self);
    }

    fn key(&mut self, key: &str) {
        if let Some(has_member) = self.has_member.last_mut() {
            if *has_member {
                self.buf.push(b',');
            }
            *has_member = true;
        }
        self.string(key);
        self.buf.push(b':');
    }

    fn string(&mut self, s: &str) {
        self.buf.push(b'"');
        for ch in s.chars() {
            match ch {
                '"' => self.buf.extend_from_slice(b"\\\""),
                '\\' => self.buf.extend_from_slice(b"\\\\"),
                '\u{08}' => self.buf.extend_from_slice(b"\\b"),
                '\u{0c}' => self.buf.extend_from_slice(b"\\f"),
                '\n' => self.buf.extend_from_slice(b"\\n"),
                '\r' => self.buf.extend_from_slice(b"\\r"),
                '\t' => self.buf.extend_from_slice(b"\\t"),
                c if (c as u32) < 0x20 => {
                    self.buf
                        .extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
                }
                c => {
                    let mut utf8 = [0u8; 4];
                    self.buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                }
            }
        }
        self.buf.push(b'"');
    }
}

impl Canonical for RepoRef {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_int("id", self.id);
        enc.field_str("full", &self.full);
        enc.end_object();
    }
}

impl Canonical for ActorRef {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_int("id", self.id);
        enc.field_str("username", &self.username);
        enc.end_object();
    }
}

impl Canonical for GitPush {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_str("ref", &self.git_ref);
        enc.field_str("before", &self.before);
        enc.field_str("after", &self.after);
        enc.end_object();
    }
}

impl Canonical for PrMerged {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_int("pr_id", self.pr_id);
        enc.field_str("base", &self.base);
        enc.field_str("head", &self.head);
        enc.field_str("merge_commit", &self.merge_commit);
        enc.end_object();
    }
}

impl Canonical for ReleasePublished {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_int("release_id", self.release_id);
        enc.field_str("tag", &self.tag);
        enc.field_str("commit_sha", &self.commit_sha);
        enc.end_object();
    }
}

impl Canonical for PermChanged {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_str("subject_type", &self.subject_type);
        enc.field_int("subject_id", self.subject_id);
        enc.field_str("permission", &self.permission);
        enc.end_object();
    }
}

impl Canonical for CiRunStart {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_int("run_id", self.run_id);
        enc.field_str("workflow_id", &self.workflow_id);
        enc.field_str("commit_sha", &self.commit_sha);
        enc.field_str("ref", &self.git_ref);
        enc.field_str("event", &self.event);
        enc.end_object();
    }
}

impl Canonical for CiRunEnd {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_int("run_id", self.run_id);
        enc.field_str("workflow_id", &self.workflow_id);
        enc.field_str("commit_sha", &self.commit_sha);
        enc.field_str("ref", &self.git_ref);
        enc.field_str("event", &self.event);
        enc.field_str("status", &self.status);
        enc.field_int("duration_ms", self.duration_ms);
        enc.end_object();
    }
}

impl Canonical for Payload {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        match self {
            Self::GitPush(p) => p.encode(enc),
            Self::PrMerged(p) => p.encode(enc),
            Self::ReleasePublished(p) => p.encode(enc),
            Self::PermChanged(p) => p.encode(enc),
            Self::CiRunStart(p) => p.encode(enc),
            Self::CiRunEnd(p) => p.encode(enc),
        }
    }
}

/// Integrity fields are blanked, whatever the receipt holds.
impl Canonical for Receipt {
    fn encode(&self, enc: &mut CanonicalEncoder) {
        enc.begin_object();
        enc.field_uint("version", u64::from(self.version));
        enc.field_str("type", self.event_type());
        enc.field_int("ts_unix_ms", self.ts_unix_ms);
        enc.field_object("repo", &self.repo);
        enc.field_object("actor", &self.actor);
        enc.field_object("payload", &self.payload);
        enc.field_str("prev_root", &self.prev_root);
        enc.field_str("receipt_hash", "");
        enc.field_str("root", "");
        enc.end_object();
    }
}

/// Canonical bytes of a receipt with `receipt_hash` and `root` cleared.
pub fn canonical_bytes(receipt: &Receipt) -> Vec<u8> {
    let mut enc = CanonicalEncoder::new();
    receipt.encode(&mut enc);
    enc.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push() -> Receipt {
        Receipt::new(
            RepoRef::new(42, "acme/widgets"),
            ActorRef::new(7, "octo"),
            GitPush {
                git_ref: "refs/heads/main".into(),
                before: "aa".into(),
                after: "bb".into(),
            },
        )
        .with_timestamp(1_700_000_000_000)
    }

    #[test]
    fn exact_bytes_for_push() {
        let expected = concat!(
            r#"{"version":1,"type":"git.push","ts_unix_ms":1700000000000,"#,
            r#""repo":{"id":42,"full":"acme/widgets"},"#,
            r#""actor":{"id":7,"username":"octo"},"#,
            r#""payload":{"ref":"refs/heads/main","before":"aa","after":"bb"},"#,
            r#""prev_root":"","receipt_hash":"","root":""}"#
        );
        assert_eq!(String::from_utf8(canonical_bytes(&push())).unwrap(), expected);
    }

    #[test]
    fn integrity_fields_are_blanked() {
        let mut sealed = push();
        sealed.receipt_hash = "b3:ffff".into();
        sealed.root = "b3:eeee".into();
        assert_eq!(canonical_bytes(&sealed), canonical_bytes(&push()));
    }

    #[test]
    fn prev_root_is_hashed() {
        let mut linked = push();
        linked.prev_root = "b3:abcd".into();
        assert_ne!(canonical_bytes(&linked), canonical_bytes(&push()));
    }

    #[test]
    fn string_escaping() {
        let mut enc = CanonicalEncoder::new();
        enc.begin_object();
        enc.field_str("s", "q\"b\\n\nt\tc\u{01}é");
        enc.end_object();
        assert_eq!(
            String::from_utf8(enc.into_bytes()).unwrap(),
            "{\"s\":\"q\\\"b\\\\n\\nt\\tc\\u0001é\"}"
        );
    }

    #[test]
    fn matches_compact_json_for_plain_values() {
        // For ASCII-only values the contract coincides with compact JSON,
        // so the canonical bytes must parse back to the same fields.
        let bytes = canonical_bytes(&push());
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["payload"]["after"], "bb");
        assert_eq!(value["actor"]["username"], "octo");
        assert_eq!(value["root"], "");
    }

    #[test]
    fn negative_integers() {
        let mut enc = CanonicalEncoder::new();
        enc.begin_object();
        enc.field_int("a", -5);
        enc.field_uint("b", 0);
        enc.end_object();
        assert_eq!(enc.into_bytes(), br#"{"a":-5,"b":0}"#.to_vec());
    }
}
