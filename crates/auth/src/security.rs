//! Security utilities: input sanitization, token generation, hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Number of random bytes behind a session token.
pub const TOKEN_BYTES: usize = 32;

/// Characters significant to downstream interpreters (markup, shells).
const DISALLOWED: &[char] = &['<', '>', '"', '\'', '`', '\\'];

/// Strip control characters and script/markup delimiters from caller input.
///
/// Legitimate mail identifiers (domain names, email local-parts) pass
/// through unchanged.
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() && !DISALLOWED.contains(c))
        .collect()
}

/// Generate an unguessable token from `len` CSPRNG bytes, URL-safe encoded.
pub fn generate_secure_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest of a secret, used as a deterministic lookup key.
///
/// Never a substitute for [`hash_secret`]: fingerprints only index the
/// credential table, verification always goes through Argon2.
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short identity reference safe to place in audit records and logs.
pub fn redact(fingerprint: &str) -> String {
    fingerprint.chars().take(8).collect()
}

/// Constant-time byte equality.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Hash a secret for at-rest storage with Argon2 and a random salt.
pub fn hash_secret(secret: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("secret hashing failed: {}", e))
}

/// Verify a secret against an Argon2 PHC string. Malformed hashes verify
/// as false rather than erroring.
pub fn verify_secret(secret: &str, phc_hash: &str) -> bool {
    match PasswordHash::new(phc_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_preserves_mail_identifiers() {
        assert_eq!(sanitize_input("user.name+tag@example.com"), "user.name+tag@example.com");
        assert_eq!(sanitize_input("mail.example-domain.org"), "mail.example-domain.org");
    }

    #[test]
    fn test_sanitize_strips_markup_and_control() {
        assert_eq!(sanitize_input("<script>alert(1)</script>"), "scriptalert(1)/script");
        assert_eq!(sanitize_input("domain\r\n.com"), "domain.com");
        assert_eq!(sanitize_input("a\"b'c`d\\e"), "abcde");
    }

    #[test]
    fn test_tokens_are_unique_and_urlsafe() {
        let a = generate_secure_token(TOKEN_BYTES);
        let b = generate_secure_token(TOKEN_BYTES);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint("secret"), fingerprint("secret"));
        assert_ne!(fingerprint("secret"), fingerprint("secres"));
        assert_eq!(redact(&fingerprint("secret")).len(), 8);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abcd", b"abcd"));
        assert!(!constant_time_eq(b"abcd", b"abce"));
        assert!(!constant_time_eq(b"abcd", b"abc"));
    }

    #[test]
    fn test_hash_and_verify_secret() {
        let hash = hash_secret("correct horse battery staple").unwrap();
        assert!(verify_secret("correct horse battery staple", &hash));
        assert!(!verify_secret("wrong secret", &hash));
        assert!(!verify_secret("anything", "not-a-phc-string"));
    }
}
