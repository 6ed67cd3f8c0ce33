// src/jwt.rs

//! The narrow JWT subset this harness needs: ES256 signing with a fixed
//! key on the provider side, and kid-resolved signature + issuer
//! verification against a published key set on the relying-party side.

use crate::error::OidcTesterError;
use crate::model::{Jwk, JsonWebKeySet};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Lifetime stamped into issued ID tokens.
pub const ID_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Signs ID tokens with a process-held EC private key, identified by `kid`.
pub struct IdTokenSigner {
    encoding_key: EncodingKey,
    kid: String,
    issuer: String,
}

#[derive(Debug, Serialize)]
struct IdTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    iat: u64,
    exp: u64,
}

impl IdTokenSigner {
    /// Creates a signer from a PKCS#8 PEM-encoded P-256 private key.
    pub fn from_pem(
        pem: &[u8],
        kid: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Result<Self, OidcTesterError> {
        let encoding_key = EncodingKey::from_ec_pem(pem).map_err(|e| {
            OidcTesterError::InvalidKeyFormat(format!("failed to parse EC private key PEM: {e}"))
        })?;
        Ok(Self {
            encoding_key,
            kid: kid.into(),
            issuer: issuer.into(),
        })
    }

    /// Produces a compact ES256 JWT with header `{kid, alg}` and claims
    /// `{iss, sub, iat, exp}`.
    pub fn sign(&self, subject: &str) -> Result<String, OidcTesterError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = IdTokenClaims {
            iss: &self.issuer,
            sub: subject,
            iat: now,
            exp: now + ID_TOKEN_TTL.as_secs(),
        };
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.kid.clone());
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }
}

/// A successfully verified ID token: decoded header and payload.
#[derive(Debug)]
pub struct VerifiedToken {
    pub header: Header,
    pub claims: Value,
}

/// Verifies a compact JWT against a published key set.
///
/// Resolves the signing key by the token's `kid`, checks the signature,
/// and, when an expected issuer is known, requires the `iss` claim to match
/// it. Nothing else is enforced (`exp`/`aud` are the provider's business,
/// not this flow's). All failures are returned as errors for the caller to
/// log as failed checks; nothing here panics.
pub fn verify_id_token(
    jwks: &JsonWebKeySet,
    expected_issuer: Option<&str>,
    token: &str,
) -> Result<VerifiedToken, OidcTesterError> {
    let header = decode_header(token)?;
    let kid = header.kid.clone().ok_or(OidcTesterError::MissingKeyId)?;
    let jwk = jwks
        .find(&kid)
        .ok_or_else(|| OidcTesterError::KeyNotFound(kid.clone()))?;
    debug!(%kid, alg = ?header.alg, "resolved signing key from JWKS");

    let decoding_key = decoding_key_for(jwk, header.alg)?;

    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    if let Some(issuer) = expected_issuer {
        // Also re-marks "iss" as a required claim.
        validation.set_issuer(&[issuer]);
    }

    let data = decode::<Value>(token, &decoding_key, &validation)?;
    Ok(VerifiedToken {
        header: data.header,
        claims: data.claims,
    })
}

fn decoding_key_for(jwk: &Jwk, alg: Algorithm) -> Result<DecodingKey, OidcTesterError> {
    match (jwk, alg) {
        (Jwk::Ec(key), Algorithm::ES256) => {
            if let Some(crv) = key.crv.as_deref() {
                if crv != "P-256" {
                    return Err(OidcTesterError::InvalidKeyFormat(format!(
                        "unsupported EC curve for ES256: {crv}"
                    )));
                }
            }
            let x = key
                .x
                .as_deref()
                .ok_or_else(|| OidcTesterError::InvalidKeyFormat("EC key missing 'x'".into()))?;
            let y = key
                .y
                .as_deref()
                .ok_or_else(|| OidcTesterError::InvalidKeyFormat("EC key missing 'y'".into()))?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| OidcTesterError::InvalidKeyFormat(e.to_string()))
        }
        (Jwk::Rsa(key), Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512) => {
            let n = key
                .n
                .as_deref()
                .ok_or_else(|| OidcTesterError::InvalidKeyFormat("RSA key missing 'n'".into()))?;
            let e = key
                .e
                .as_deref()
                .ok_or_else(|| OidcTesterError::InvalidKeyFormat("RSA key missing 'e'".into()))?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| OidcTesterError::InvalidKeyFormat(e.to_string()))
        }
        (_, alg) => Err(OidcTesterError::UnsupportedAlgorithm(alg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::dev_key;

    fn dev_jwks() -> JsonWebKeySet {
        crate::model::validate_jwks(&dev_key::public_jwks()).unwrap()
    }

    fn dev_signer(issuer: &str) -> IdTokenSigner {
        IdTokenSigner::from_pem(dev_key::PRIVATE_KEY_PEM.as_bytes(), dev_key::KID, issuer).unwrap()
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let signer = dev_signer("http://idp.test");
        let token = signer.sign("alice").unwrap();
        assert!(crate::model::looks_like_compact_jwt(&token));

        let verified = verify_id_token(&dev_jwks(), Some("http://idp.test"), &token).unwrap();
        assert_eq!(verified.header.kid.as_deref(), Some(dev_key::KID));
        assert_eq!(verified.claims["iss"], "http://idp.test");
        assert_eq!(verified.claims["sub"], "alice");
        assert!(verified.claims["exp"].as_u64().unwrap() > verified.claims["iat"].as_u64().unwrap());
    }

    #[test]
    fn verify_without_known_issuer_skips_the_iss_check() {
        let signer = dev_signer("http://idp.test");
        let token = signer.sign("alice").unwrap();
        assert!(verify_id_token(&dev_jwks(), None, &token).is_ok());
    }

    #[test]
    fn issuer_mismatch_fails() {
        let signer = dev_signer("http://idp.test");
        let token = signer.sign("alice").unwrap();
        let err = verify_id_token(&dev_jwks(), Some("http://other.test"), &token).unwrap_err();
        assert!(matches!(err, OidcTesterError::Jwt(_)));
    }

    #[test]
    fn unknown_kid_fails() {
        let signer =
            IdTokenSigner::from_pem(dev_key::PRIVATE_KEY_PEM.as_bytes(), "nope", "http://idp.test")
                .unwrap();
        let token = signer.sign("alice").unwrap();
        let err = verify_id_token(&dev_jwks(), None, &token).unwrap_err();
        assert!(matches!(err, OidcTesterError::KeyNotFound(kid) if kid == "nope"));
    }

    #[test]
    fn missing_kid_fails() {
        let key = EncodingKey::from_ec_pem(dev_key::PRIVATE_KEY_PEM.as_bytes()).unwrap();
        let token = encode(
            &Header::new(Algorithm::ES256),
            &serde_json::json!({"iss": "x", "sub": "y"}),
            &key,
        )
        .unwrap();
        let err = verify_id_token(&dev_jwks(), None, &token).unwrap_err();
        assert!(matches!(err, OidcTesterError::MissingKeyId));
    }

    #[test]
    fn tampered_payload_fails_signature_verification() {
        use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};

        let signer = dev_signer("http://idp.test");
        let token = signer.sign("alice").unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = URL_SAFE_NO_PAD.encode(r#"{"iss":"http://idp.test","sub":"mallory"}"#);
        let forged = parts.join(".");

        assert!(verify_id_token(&dev_jwks(), None, &forged).is_err());
    }
}
