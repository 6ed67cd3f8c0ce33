// src/config.rs

use crate::error::OidcTesterError;
use url::Url;

/// The path at which every OIDC provider publishes its configuration.
/// Fixed by OpenID Connect Discovery; all other URLs are discovered from
/// the document that lives at this path.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// The configuration for the relying-party-side conformance engine.
///
/// This struct holds everything needed to drive a provider through the
/// authorization-code flow. It should be constructed using the
/// `ConfigBuilder`. The documents it points at (discovery, JWKS) are
/// fetched and validated at flow time, not here.
#[derive(Debug, Clone)]
pub struct TesterConfig {
    /// Base URL of the OIDC provider under test.
    pub server_url: Url,
    /// Where the provider should send the browser back with the code.
    pub redirect_uri: Url,
    /// Client ID, for providers that require one (e.g. Google).
    pub client_id: Option<String>,
    /// Client secret, forwarded on the token request when present.
    pub client_secret: Option<String>,
    /// Scope string for the authorization request. Defaults to "openid".
    pub scope: String,
}

impl TesterConfig {
    /// The fixed well-known discovery URL for the configured provider.
    pub fn discovery_url(&self) -> Result<Url, OidcTesterError> {
        self.server_url
            .join(DISCOVERY_PATH)
            .map_err(|e| OidcTesterError::InvalidUrl(e.to_string()))
    }
}

/// A builder for creating a `TesterConfig` instance.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    server_url: Option<Url>,
    redirect_uri: Option<Url>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the OIDC provider. This is a required field.
    pub fn server_url(mut self, url: &str) -> Result<Self, OidcTesterError> {
        let parsed = Url::parse(url).map_err(|e| OidcTesterError::InvalidUrl(e.to_string()))?;
        self.server_url = Some(parsed);
        Ok(self)
    }

    /// Sets the redirect URI registered for this client. This is a required field.
    pub fn redirect_uri(mut self, url: &str) -> Result<Self, OidcTesterError> {
        let parsed = Url::parse(url).map_err(|e| OidcTesterError::InvalidUrl(e.to_string()))?;
        self.redirect_uri = Some(parsed);
        Ok(self)
    }

    /// Sets the client ID. Optional; the mock provider does not need one.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret. Optional.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the scope string for the authorization request. Optional.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Consumes the builder and returns a `TesterConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field (`server_url`, `redirect_uri`)
    /// is missing.
    pub fn build(self) -> Result<TesterConfig, OidcTesterError> {
        let server_url = self
            .server_url
            .ok_or_else(|| OidcTesterError::MissingConfiguration("server_url".to_string()))?;
        let redirect_uri = self
            .redirect_uri
            .ok_or_else(|| OidcTesterError::MissingConfiguration("redirect_uri".to_string()))?;

        Ok(TesterConfig {
            server_url,
            redirect_uri,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scope: self.scope.unwrap_or_else(|| "openid".to_string()),
        })
    }
}
