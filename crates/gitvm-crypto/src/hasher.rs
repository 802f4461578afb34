use gitvm_types::Receipt;

use crate::canonical::canonical_bytes;

/// Algorithm tag prefixed to every hash string.
pub const HASH_TAG: &str = "b3:";

/// Length of a tagged hash: tag plus 64 hex characters.
const TAGGED_LEN: usize = 3 + 64;

/// BLAKE3-256 of `data`, hex-encoded and tagged: `"b3:" + 64 hex chars`.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{HASH_TAG}{}", hex::encode(blake3::hash(data).as_bytes()))
}

/// Hash of a receipt's canonical bytes (integrity fields blanked).
pub fn receipt_hash(receipt: &Receipt) -> String {
    hash_bytes(&canonical_bytes(receipt))
}

/// Fold a receipt hash into the rolling root: `Hash(prev_root + "|" + receipt_hash)`.
///
/// The genesis `prev_root` is the empty string.
pub fn fold(prev_root: &str, receipt_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev_root.as_bytes());
    hasher.update(b"|");
    hasher.update(receipt_hash.as_bytes());
    format!("{HASH_TAG}{}", hex::encode(hasher.finalize().as_bytes()))
}

/// Returns `true` if `s` looks like `"b3:"` followed by 64 lowercase hex chars.
pub fn is_tagged_hash(s: &str) -> bool {
    s.len() == TAGGED_LEN
        && s.starts_with(HASH_TAG)
        && s[HASH_TAG.len()..]
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_tagged() {
        let h1 = hash_bytes(b"hello world");
        let h2 = hash_bytes(b"hello world");
        assert_eq!(h1, h2);
        assert!(h1.starts_with("b3:"));
        assert_eq!(h1.len(), 67);
        assert!(is_tagged_hash(&h1));
    }

    #[test]
    fn hash_matches_blake3() {
        // Known BLAKE3 digest of the empty input.
        assert_eq!(
            hash_bytes(b""),
            "b3:af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn fold_is_hash_of_joined_strings() {
        let prev = hash_bytes(b"prev");
        let rh = hash_bytes(b"receipt");
        assert_eq!(fold(&prev, &rh), hash_bytes(format!("{prev}|{rh}").as_bytes()));
    }

    #[test]
    fn genesis_fold_uses_empty_prev() {
        let rh = hash_bytes(b"first");
        assert_eq!(fold("", &rh), hash_bytes(format!("|{rh}").as_bytes()));
    }

    #[test]
    fn fold_is_order_sensitive() {
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_ne!(fold(&a, &b), fold(&b, &a));
    }

    #[test]
    fn tagged_hash_shape() {
        assert!(!is_tagged_hash(""));
        assert!(!is_tagged_hash("sha256:00"));
        assert!(!is_tagged_hash(&format!("b3:{}", "A".repeat(64))));
        assert!(is_tagged_hash(&format!("b3:{}", "0f".repeat(32))));
    }
}
