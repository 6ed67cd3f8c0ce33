// src/pkce.rs

//! PKCE (Proof Key for Code Exchange) verifier/challenge pairs, S256 method
//! as specified in RFC 7636.
//!
//! The verifier is the client-held secret: it must never be logged or put
//! in a URL, and is only ever transmitted in the final token request. The
//! challenge is its public SHA-256 derivative, sent with the authorization
//! request so the server can bind the issued code to the verifier.

use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a cryptographically random PKCE code verifier.
///
/// 32 bytes from the OS CSPRNG, encoded as unpadded base64url. The unpadded
/// encoding of 32 bytes is always 43 characters, within the 43-128 range
/// RFC 7636 requires.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge for a verifier.
///
/// `challenge = BASE64URL(SHA256(ASCII(verifier)))`
pub fn derive_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Returns true iff `verifier` hashes to `challenge`.
///
/// The challenge is not itself a secret, so a plain comparison suffices.
pub fn verify(verifier: &str, challenge: &str) -> bool {
    derive_challenge(verifier) == challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_43_url_safe_chars() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), 43);
        assert!(verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn verifiers_are_unique() {
        assert_ne!(generate_verifier(), generate_verifier());
    }

    #[test]
    fn challenge_matches_known_value() {
        // SHA256("hello"), base64url-encoded without padding.
        assert_eq!(
            derive_challenge("hello"),
            "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ"
        );
    }

    #[test]
    fn verify_roundtrip() {
        let verifier = generate_verifier();
        let challenge = derive_challenge(&verifier);
        assert!(verify(&verifier, &challenge));
    }

    #[test]
    fn verify_rejects_foreign_verifier() {
        let challenge = derive_challenge(&generate_verifier());
        assert!(!verify(&generate_verifier(), &challenge));
    }
}
