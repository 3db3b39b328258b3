//! Content fingerprinting used for ingestion idempotency.

use sha2::{Digest, Sha256};

/// Compute a deterministic SHA-256 fingerprint over raw upload bytes.
///
/// The hash is taken over the original bytes, never the extracted text, so two
/// uploads of the same file dedupe even when extraction output drifts between
/// model versions. Always succeeds; empty input hashes to the canonical digest
/// of the empty sequence.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        let bytes = b"Hello world";
        let h1 = content_hash(bytes);
        let h2 = content_hash(bytes);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn empty_input_hashes_to_canonical_digest() {
        assert_eq!(
            content_hash(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn distinct_bytes_produce_distinct_hashes() {
        assert_ne!(content_hash(b"alpha"), content_hash(b"beta"));
    }
}
