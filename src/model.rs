// src/model.rs

//! Wire-document models and their schema validators.
//!
//! Every document fetched from a provider is first parsed as raw
//! `serde_json::Value` and then run through one of the `validate_*`
//! functions here, so that a malformed response surfaces as a violation
//! message (and a failed check) rather than a deserialization panic deep
//! inside the flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The minimum interface expected from an OpenID Connect discovery
/// document. Additional fields are permitted and ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
}

const REQUIRED_CONFIG_FIELDS: &[&str] = &[
    "issuer",
    "authorization_endpoint",
    "jwks_uri",
    "token_endpoint",
];

/// Validates a retrieved JSON document as an OpenID Connect configuration.
pub fn validate_oidc_config(value: &Value) -> Result<OidcConfig, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "config document must be a JSON object".to_string())?;
    for field in REQUIRED_CONFIG_FIELDS {
        match object.get(*field) {
            None => return Err(format!("'{field}' is required")),
            Some(v) if !v.is_string() => return Err(format!("'{field}' must be a string")),
            Some(_) => {}
        }
    }
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

/// A single JSON Web Key, tagged by its `kty`.
///
/// Only the EC and RSA key types are accepted; anything else is rejected at
/// the deserialization boundary. Each variant models the private-key
/// parameters of its type so that a published key set leaking them can be
/// detected.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "EC")]
    Ec(EcKey),
    #[serde(rename = "RSA")]
    Rsa(RsaKey),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EcKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_purpose: Option<String>,
    /// EC private scalar. Must never appear in a published key set, so it
    /// is parsed (to detect leaks) but never serialized.
    #[serde(default, skip_serializing)]
    pub d: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RsaKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_purpose: Option<String>,
    // RSA private parameters, parsed only to detect leaks.
    #[serde(default, skip_serializing)]
    pub d: Option<String>,
    #[serde(default, skip_serializing)]
    pub p: Option<String>,
    #[serde(default, skip_serializing)]
    pub q: Option<String>,
    #[serde(default, skip_serializing)]
    pub dp: Option<String>,
    #[serde(default, skip_serializing)]
    pub dq: Option<String>,
    #[serde(default, skip_serializing)]
    pub qi: Option<String>,
}

impl Jwk {
    /// The key identifier, when the key carries one.
    pub fn kid(&self) -> Option<&str> {
        match self {
            Jwk::Ec(k) => k.kid.as_deref(),
            Jwk::Rsa(k) => k.kid.as_deref(),
        }
    }

    /// Name of the first non-empty private parameter this key exposes,
    /// if any.
    fn leaked_private_param(&self) -> Option<&'static str> {
        fn set(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.is_empty())
        }
        match self {
            Jwk::Ec(k) => set(&k.d).then_some("d"),
            Jwk::Rsa(k) => [
                ("d", &k.d),
                ("p", &k.p),
                ("q", &k.q),
                ("dp", &k.dp),
                ("dq", &k.dq),
                ("qi", &k.qi),
            ]
            .into_iter()
            .find_map(|(name, v)| set(v).then_some(name)),
        }
    }

    fn kty(&self) -> &'static str {
        match self {
            Jwk::Ec(_) => "EC",
            Jwk::Rsa(_) => "RSA",
        }
    }
}

/// A JSON Web Key Set, the set of public keys a provider publishes for
/// token verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<Jwk>,
}

impl JsonWebKeySet {
    /// Finds a key by its `kid`.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid() == Some(kid))
    }
}

/// Validates a retrieved JSON document as a public JSON Web Key Set.
///
/// Rejects empty sets, unknown key types, and any key carrying private-key
/// material; the violation message names the offending rule.
pub fn validate_jwks(value: &Value) -> Result<JsonWebKeySet, String> {
    let keys = value
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| "'keys' is required and must be an array".to_string())?;
    if keys.is_empty() {
        return Err("'keys' must contain at least one key".to_string());
    }

    let mut parsed = Vec::with_capacity(keys.len());
    for (i, raw) in keys.iter().enumerate() {
        let jwk: Jwk = serde_json::from_value(raw.clone()).map_err(|e| {
            format!("keys[{i}] is not a valid public key (kty must be 'EC' or 'RSA'): {e}")
        })?;
        if let Some(param) = jwk.leaked_private_param() {
            return Err(format!(
                "JWKS contains private {} key information (keys[{i}] sets '{param}')",
                jwk.kty()
            ));
        }
        parsed.push(jwk);
    }
    Ok(JsonWebKeySet { keys: parsed })
}

/// The interesting part of a token-endpoint response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub id_token: String,
}

/// Validates a token-endpoint response: `id_token` must be present and
/// shaped like a compact JWT.
pub fn validate_token_response(value: &Value) -> Result<TokenResponse, String> {
    let id_token = value
        .get("id_token")
        .and_then(Value::as_str)
        .ok_or_else(|| "'id_token' is required and must be a string".to_string())?;
    if !looks_like_compact_jwt(id_token) {
        return Err(
            "'id_token' is not a compact JWT (three non-empty base64url segments)".to_string(),
        );
    }
    Ok(TokenResponse {
        id_token: id_token.to_string(),
    })
}

/// Coarse structural check: three dot-separated, non-empty base64url
/// segments.
pub fn looks_like_compact_jwt(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_config() -> Value {
        json!({
            "issuer": "http://localhost:8000",
            "authorization_endpoint": "http://localhost:8000/authorize",
            "jwks_uri": "http://localhost:8000/jwks.json",
            "token_endpoint": "http://localhost:8000/token",
            "response_types_supported": ["code"]
        })
    }

    #[test]
    fn config_with_all_fields_validates() {
        let config = validate_oidc_config(&full_config()).unwrap();
        assert_eq!(config.issuer, "http://localhost:8000");
        assert_eq!(config.token_endpoint, "http://localhost:8000/token");
    }

    #[test]
    fn config_missing_a_field_is_a_violation_not_a_crash() {
        for field in REQUIRED_CONFIG_FIELDS {
            let mut doc = full_config();
            doc.as_object_mut().unwrap().remove(*field);
            let message = validate_oidc_config(&doc).unwrap_err();
            assert!(message.contains(field), "message should name '{field}'");
        }
    }

    #[test]
    fn config_with_non_string_field_is_rejected() {
        let mut doc = full_config();
        doc["issuer"] = json!(42);
        let message = validate_oidc_config(&doc).unwrap_err();
        assert!(message.contains("issuer"));
    }

    #[test]
    fn jwks_requires_at_least_one_key() {
        assert!(validate_jwks(&json!({"keys": []})).is_err());
        assert!(validate_jwks(&json!({})).is_err());
    }

    #[test]
    fn jwks_rejects_unknown_key_types() {
        let doc = json!({"keys": [{"kty": "oct", "kid": "k1"}]});
        let message = validate_jwks(&doc).unwrap_err();
        assert!(message.contains("kty"));
    }

    #[test]
    fn jwks_rejects_private_ec_material() {
        let doc = json!({"keys": [{
            "kty": "EC", "kid": "k1", "crv": "P-256",
            "x": "abc", "y": "def", "d": "SECRET"
        }]});
        let message = validate_jwks(&doc).unwrap_err();
        assert!(message.contains("private EC key information"), "{message}");
    }

    #[test]
    fn jwks_rejects_private_rsa_material() {
        let doc = json!({"keys": [{
            "kty": "RSA", "kid": "k1", "n": "abc", "e": "AQAB", "p": "SECRET"
        }]});
        let message = validate_jwks(&doc).unwrap_err();
        assert!(message.contains("private RSA key information"), "{message}");
    }

    #[test]
    fn jwks_ignores_empty_private_params() {
        // An empty string is not leaked material (mirrors a truthiness
        // check on the wire format).
        let doc = json!({"keys": [{
            "kty": "EC", "kid": "k1", "crv": "P-256", "x": "abc", "y": "def", "d": ""
        }]});
        let set = validate_jwks(&doc).unwrap();
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.find("k1").and_then(Jwk::kid), Some("k1"));
    }

    #[test]
    fn private_params_never_serialize() {
        let doc = json!({"keys": [{
            "kty": "EC", "kid": "k1", "crv": "P-256", "x": "abc", "y": "def", "d": ""
        }]});
        let set = validate_jwks(&doc).unwrap();
        let round = serde_json::to_value(&set).unwrap();
        assert!(round["keys"][0].get("d").is_none());
    }

    #[test]
    fn token_response_shape() {
        assert!(validate_token_response(&json!({"id_token": "aa.bb.cc"})).is_ok());
        assert!(validate_token_response(&json!({"id_token": "aa.bb"})).is_err());
        assert!(validate_token_response(&json!({"id_token": "aa..cc"})).is_err());
        assert!(validate_token_response(&json!({"id_token": "a+b.cc.dd"})).is_err());
        assert!(validate_token_response(&json!({"access_token": "x"})).is_err());
    }
}
