use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate an opaque security token (hex, 256 bits of entropy).
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

/// Generate a short numeric one-time code for out-of-band delivery.
pub fn generate_numeric_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Digest of a token as stored at rest; raw tokens are never persisted.
pub fn token_digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a presented token against a stored digest in constant time.
pub fn digest_matches(presented: &str, stored_digest: &str) -> bool {
    let presented_digest = token_digest(presented);
    presented_digest
        .as_bytes()
        .ct_eq(stored_digest.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_is_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_numeric_code_shape() {
        let code = generate_numeric_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_digest_round_trip() {
        let raw = generate_token();
        let digest = token_digest(&raw);
        assert!(digest_matches(&raw, &digest));
        assert!(!digest_matches("something-else", &digest));
    }
}
