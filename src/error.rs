// src/error.rs

use thiserror::Error;

/// The primary error type for the `oidc-tester` crate.
///
/// The variants map onto the failure taxonomy of the conformance engine:
/// transport failures, schema violations, JWT verification failures and
/// usage errors. Every variant is reported through the conformance log
/// before it is propagated.
#[derive(Debug, Error)]
pub enum OidcTesterError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A network-level failure talking to the provider.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The provider answered, but not with a 2xx status.
    #[error("{context} failed with {status}:\n{body}")]
    UnexpectedStatus {
        context: String,
        status: u16,
        body: String,
    },

    /// A response document did not match its expected schema.
    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("The JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    #[error("No key found in the JWKS for kid: {0}")]
    KeyNotFound(String),

    #[error("Unsupported JWT algorithm: {0:?}")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("Invalid JWK format: {0}")]
    InvalidKeyFormat(String),

    /// The authorization-code space was exhausted after bounded retries.
    #[error("Could not generate a unique authorization code after {0} attempts")]
    CodeSpaceExhausted(u32),

    /// The flow was driven out of order, e.g. a callback arrived without a
    /// stored PKCE verifier. Fatal: signals a client bug, not a provider bug.
    #[error("Usage error: {0}")]
    Usage(String),
}
