// src/client.rs

use crate::checks::ConformanceLog;
use crate::config::TesterConfig;
use crate::error::OidcTesterError;
use crate::model::{self, JsonWebKeySet, OidcConfig};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// Fetches and schema-validates the provider's published documents: the
/// OIDC discovery configuration and the JSON Web Key Set.
///
/// Every fetch and every validation is recorded in the conformance log;
/// any failure (network, non-2xx, invalid JSON, schema violation) is both
/// a failed check and an error that halts the dependent stage.
#[derive(Clone)]
pub struct DiscoveryClient {
    config: TesterConfig,
    http_client: reqwest::Client,
    log: ConformanceLog,
}

impl DiscoveryClient {
    pub fn new(config: TesterConfig, log: ConformanceLog) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            log,
        }
    }

    /// Retrieve and validate the OIDC config from the provider.
    #[instrument(skip(self), err)]
    pub async fn fetch_config(&self) -> Result<OidcConfig, OidcTesterError> {
        let url = self.config.discovery_url()?;
        let document = self
            .log
            .attempt(
                "/.well-known/openid-configuration can be fetched and is valid JSON",
                self.get_json(url, "/.well-known/openid-configuration"),
            )
            .await?;

        self.log.validate(
            &document,
            model::validate_oidc_config,
            "/.well-known/openid-configuration is a valid OpenID Connect config doc",
        )
    }

    /// Retrieve and validate the JSON Web Key Set from the URI the config
    /// advertises. Only callable once `fetch_config` has succeeded, which
    /// the typed parameter enforces.
    #[instrument(skip_all, err)]
    pub async fn fetch_jwks(&self, config: &OidcConfig) -> Result<JsonWebKeySet, OidcTesterError> {
        let jwks_uri = config.jwks_uri.clone();
        let document = self
            .log
            .attempt("JWKS (jwks_uri) can be fetched and is valid JSON", async {
                let url = Url::parse(&jwks_uri)
                    .map_err(|e| OidcTesterError::InvalidUrl(e.to_string()))?;
                self.get_json(url, "jwks_uri").await
            })
            .await?;

        self.log.validate(
            &document,
            model::validate_jwks,
            "JWKS is a valid public JSON Web Key Set",
        )
    }

    /// GET a URL, require a 2xx status, and parse the body as JSON. A
    /// non-2xx response carries the status and body text in the error so
    /// the resulting check details say what the provider actually sent.
    async fn get_json(&self, url: Url, context: &str) -> Result<Value, OidcTesterError> {
        debug!(%url, "fetching");
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OidcTesterError::UnexpectedStatus {
                context: context.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}
