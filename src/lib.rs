// src/lib.rs

//! A harness for exercising and validating the OAuth2 Authorization Code
//! flow with PKCE, as profiled by OpenID Connect.
//!
//! Two cooperating halves:
//!
//! - [`server::MockIdp`]: a minimal mock identity provider that issues
//!   single-use authorization codes bound to a PKCE challenge and
//!   exchanges them for signed ES256 ID tokens.
//! - [`flow::OidcFlow`]: a relying-party-side conformance engine that
//!   drives an arbitrary OIDC provider through discovery, authorization,
//!   code exchange and JWT verification, recording a pass/fail
//!   [`checks::Check`] for every protocol expectation it tests.

pub mod cache;
pub mod checks;
pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod jwt;
pub mod model;
pub mod pkce;
pub mod server;

/// The public prelude for the `oidc-tester` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::checks::{Check, ConformanceLog};
    pub use crate::config::{ConfigBuilder, TesterConfig};
    pub use crate::error::OidcTesterError;
    pub use crate::flow::{FlowState, OidcFlow, StageStatus};
    pub use crate::jwt::VerifiedToken;
    pub use crate::model::{JsonWebKeySet, OidcConfig};
    pub use crate::server::{MockIdp, MockIdpBuilder};
}
