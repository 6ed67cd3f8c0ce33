// src/flow.rs

//! The flow state machine: sequences discovery → authorize-redirect →
//! code exchange → verification, and exposes per-stage status to the
//! (excluded) UI layer.
//!
//! Execution is single-threaded cooperative; every network call is an
//! ordinary awaited suspension point, so the ordering guarantees (jwks
//! after config, exchange only with both a code and a stored verifier)
//! fall straight out of the control flow. There is no retry, timeout or
//! cancellation: a failed stage stays `Error` until the consumer restarts
//! the flow.

use crate::checks::{Check, ConformanceLog};
use crate::client::DiscoveryClient;
use crate::config::TesterConfig;
use crate::error::OidcTesterError;
use crate::jwt::{self, VerifiedToken};
use crate::model::{self, JsonWebKeySet, OidcConfig};
use crate::pkce;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

/// Status of one stage of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageStatus {
    #[default]
    Unstarted,
    Loading,
    Loaded,
    Error,
}

/// The three independent stage statuses the UI renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowState {
    pub config: StageStatus,
    pub jwks: StageStatus,
    pub token: StageStatus,
}

/// Drives one relying-party session through the authorization-code flow.
///
/// The struct itself is the session scope: the PKCE verifier lives in it
/// between `begin_authorization` and `complete_authorization` and nowhere
/// else, never in a URL, a log line or a check detail.
pub struct OidcFlow {
    config: TesterConfig,
    discovery: DiscoveryClient,
    http_client: reqwest::Client,
    log: ConformanceLog,
    state: FlowState,
    oidc_config: Option<OidcConfig>,
    jwks: Option<JsonWebKeySet>,
    token: Option<String>,
    verifier: Option<String>,
}

impl OidcFlow {
    pub fn new(config: TesterConfig) -> Self {
        let log = ConformanceLog::new();
        let discovery = DiscoveryClient::new(config.clone(), log.clone());
        Self {
            config,
            discovery,
            http_client: reqwest::Client::new(),
            log,
            state: FlowState::default(),
            oidc_config: None,
            jwks: None,
            token: None,
            verifier: None,
        }
    }

    /// Current per-stage statuses.
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// The shared conformance log this flow reports through.
    pub fn log(&self) -> &ConformanceLog {
        &self.log
    }

    /// Snapshot of all checks recorded so far.
    pub fn checks(&self) -> Vec<Check> {
        self.log.checks()
    }

    pub fn oidc_config(&self) -> Option<&OidcConfig> {
        self.oidc_config.as_ref()
    }

    pub fn jwks(&self) -> Option<&JsonWebKeySet> {
        self.jwks.as_ref()
    }

    pub fn id_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Fetches the discovery document and, on success, continues directly
    /// into the JWKS fetch. A failed JWKS fetch does not discard the
    /// already-loaded config.
    ///
    /// Failures have already been logged as checks by the time a stage is
    /// marked `Error`; the returned state is the whole story.
    pub async fn load_provider_metadata(&mut self) -> FlowState {
        self.state.config = StageStatus::Loading;
        let oidc_config = match self.discovery.fetch_config().await {
            Ok(config) => {
                info!(issuer = %config.issuer, "provider configuration loaded");
                self.state.config = StageStatus::Loaded;
                self.oidc_config = Some(config.clone());
                config
            }
            Err(err) => {
                warn!(%err, "provider configuration could not be loaded");
                self.state.config = StageStatus::Error;
                self.oidc_config = None;
                return self.state;
            }
        };

        // Direct sequential continuation: the jwks stage starts if and
        // only if the config stage just finished loading.
        self.state.jwks = StageStatus::Loading;
        match self.discovery.fetch_jwks(&oidc_config).await {
            Ok(jwks) => {
                self.state.jwks = StageStatus::Loaded;
                self.jwks = Some(jwks);
            }
            Err(err) => {
                warn!(%err, "JWKS could not be loaded");
                self.state.jwks = StageStatus::Error;
                self.jwks = None;
            }
        }
        self.state
    }

    /// Builds the authorization URL the user should be navigated to, and
    /// stores the freshly generated PKCE verifier in this session.
    ///
    /// The navigation itself is a full-page redirect owned by the UI layer
    /// and is not awaited here.
    pub fn begin_authorization(&mut self) -> Result<Url, OidcTesterError> {
        let oidc_config = self.require_loaded_config("begin_authorization")?;

        let verifier = pkce::generate_verifier();
        let challenge = pkce::derive_challenge(&verifier);

        let mut url = Url::parse(&oidc_config.authorization_endpoint)
            .map_err(|e| OidcTesterError::InvalidUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(client_id) = &self.config.client_id {
                pairs.append_pair("client_id", client_id);
            }
            pairs.append_pair("redirect_uri", self.config.redirect_uri.as_str());
            pairs.append_pair("response_type", "code");
            pairs.append_pair("response_mode", "query");
            pairs.append_pair("code_challenge", &challenge);
            pairs.append_pair("code_challenge_method", "S256");
            pairs.append_pair("scope", &self.config.scope);
        }

        self.verifier = Some(verifier);
        Ok(url)
    }

    /// Exchanges the authorization code delivered to the redirect URI for
    /// an ID token.
    ///
    /// Requires a loaded config and the verifier stored by
    /// `begin_authorization`; a missing verifier means the flow was never
    /// initiated from this session, which is a fatal usage error, not a
    /// stage failure. Exchange failures mark the token stage `Error` and also
    /// propagate, so callers may inspect either.
    pub async fn complete_authorization(&mut self, code: &str) -> Result<(), OidcTesterError> {
        let oidc_config = self.require_loaded_config("complete_authorization")?.clone();
        let Some(verifier) = self.verifier.take() else {
            return Err(OidcTesterError::Usage(
                "no PKCE verifier is stored for this session; the flow was not initiated here"
                    .to_string(),
            ));
        };

        self.state.token = StageStatus::Loading;
        match self.exchange_code(&oidc_config, code, &verifier).await {
            Ok(token) => {
                self.state.token = StageStatus::Loaded;
                self.token = Some(token);
                Ok(())
            }
            Err(err) => {
                self.state.token = StageStatus::Error;
                self.token = None;
                Err(err)
            }
        }
    }

    /// Verifies the obtained ID token against the discovered JWKS and
    /// issuer. A verification failure is a logged failed check and `None`,
    /// never a crash.
    pub async fn verify_token(&self) -> Option<VerifiedToken> {
        let (Some(oidc_config), Some(jwks), Some(token)) = (
            self.oidc_config.as_ref(),
            self.jwks.as_ref(),
            self.token.as_deref(),
        ) else {
            return None;
        };

        self.log
            .attempt("ID Token passes JWT verification", async {
                jwt::verify_id_token(jwks, Some(oidc_config.issuer.as_str()), token)
            })
            .await
            .ok()
    }

    /// Discards the token and resets its stage to `Unstarted`. Synchronous,
    /// no network effect; config and jwks stages are untouched.
    pub fn logout(&mut self) {
        self.state.token = StageStatus::Unstarted;
        self.token = None;
    }

    fn require_loaded_config(&self, operation: &str) -> Result<&OidcConfig, OidcTesterError> {
        match (self.state.config, self.oidc_config.as_ref()) {
            (StageStatus::Loaded, Some(config)) => Ok(config),
            _ => Err(OidcTesterError::Usage(format!(
                "{operation} was called before the provider configuration was loaded"
            ))),
        }
    }

    async fn exchange_code(
        &self,
        oidc_config: &OidcConfig,
        code: &str,
        verifier: &str,
    ) -> Result<String, OidcTesterError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        if let Some(client_id) = &self.config.client_id {
            form.push(("client_id", client_id));
        }
        if let Some(client_secret) = &self.config.client_secret {
            form.push(("client_secret", client_secret));
        }

        let body: Value = self
            .log
            .attempt("Token endpoint returns a JSON response", async {
                let response = self
                    .http_client
                    .post(&oidc_config.token_endpoint)
                    .form(&form)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(OidcTesterError::UnexpectedStatus {
                        context: "Token endpoint".to_string(),
                        status: status.as_u16(),
                        body,
                    });
                }
                Ok(response.json().await?)
            })
            .await?;

        let token_response = self.log.validate(
            &body,
            model::validate_token_response,
            "Token JSON contains id_token, and the token looks like a JWT",
        )?;
        Ok(token_response.id_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    fn test_flow() -> OidcFlow {
        let config = ConfigBuilder::new()
            .server_url("http://localhost:8000")
            .unwrap()
            .redirect_uri("http://localhost:3000/callback")
            .unwrap()
            .client_id("tester")
            .build()
            .unwrap();
        OidcFlow::new(config)
    }

    fn loaded_config() -> OidcConfig {
        OidcConfig {
            issuer: "http://localhost:8000".to_string(),
            authorization_endpoint: "http://localhost:8000/authorize".to_string(),
            jwks_uri: "http://localhost:8000/jwks.json".to_string(),
            token_endpoint: "http://localhost:8000/token".to_string(),
        }
    }

    #[test]
    fn stages_start_unstarted() {
        let flow = test_flow();
        assert_eq!(flow.state().config, StageStatus::Unstarted);
        assert_eq!(flow.state().jwks, StageStatus::Unstarted);
        assert_eq!(flow.state().token, StageStatus::Unstarted);
    }

    #[test]
    fn begin_authorization_before_discovery_is_a_usage_error() {
        let mut flow = test_flow();
        let err = flow.begin_authorization().unwrap_err();
        assert!(matches!(err, OidcTesterError::Usage(_)));
        assert!(flow.verifier.is_none());
    }

    #[test]
    fn begin_authorization_builds_the_url_and_stores_the_verifier() {
        let mut flow = test_flow();
        flow.state.config = StageStatus::Loaded;
        flow.oidc_config = Some(loaded_config());

        let url = flow.begin_authorization().unwrap();
        let params: std::collections::HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(params["response_type"], "code");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["scope"], "openid");
        assert_eq!(params["client_id"], "tester");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/callback");

        let verifier = flow.verifier.as_deref().expect("verifier stored");
        assert_eq!(params["code_challenge"], pkce::derive_challenge(verifier));
        // The secret must not leak into the URL.
        assert!(!url.as_str().contains(verifier));
    }

    #[tokio::test]
    async fn callback_without_a_stored_verifier_is_fatal() {
        let mut flow = test_flow();
        flow.state.config = StageStatus::Loaded;
        flow.oidc_config = Some(loaded_config());

        let err = flow.complete_authorization("some-code").await.unwrap_err();
        assert!(matches!(err, OidcTesterError::Usage(_)));
        // Not a stage failure: the token stage was never entered.
        assert_eq!(flow.state().token, StageStatus::Unstarted);
    }

    #[test]
    fn logout_resets_only_the_token_stage() {
        let mut flow = test_flow();
        flow.state = FlowState {
            config: StageStatus::Loaded,
            jwks: StageStatus::Loaded,
            token: StageStatus::Loaded,
        };
        flow.token = Some("a.b.c".to_string());

        flow.logout();

        assert_eq!(flow.state().token, StageStatus::Unstarted);
        assert!(flow.id_token().is_none());
        assert_eq!(flow.state().config, StageStatus::Loaded);
        assert_eq!(flow.state().jwks, StageStatus::Loaded);
    }

    #[tokio::test]
    async fn verify_token_without_metadata_is_none() {
        let flow = test_flow();
        assert!(flow.verify_token().await.is_none());
        // Nothing to verify is not a failed check either.
        assert!(flow.checks().is_empty());
    }
}
