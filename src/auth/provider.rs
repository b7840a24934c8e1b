//! Auth provider implementation
//!
//! Attaches credentials to requests and manages token acquisition for the
//! OAuth2 flows. Tokens are fetched lazily, cached for the provider's
//! lifetime, and acquired single-flight: concurrent callers wait for the one
//! token request in progress instead of issuing their own.

use super::types::{AuthConfig, ClientAuth, Credential, Location};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Cached outcome of the last token request
#[derive(Debug, Clone, Default)]
enum TokenSlot {
    #[default]
    Empty,
    Ready(Credential),
    /// The token endpoint rejected us; not retried for the provider's lifetime
    Rejected(String),
}

/// Produces and refreshes credentials for one client session
pub struct AuthProvider {
    /// Auth configuration
    config: AuthConfig,
    /// Cached token for the token-based flows
    slot: Arc<RwLock<TokenSlot>>,
    /// Transport for token requests
    transport: Arc<dyn Transport>,
    /// Timeout for token requests
    timeout: Duration,
}

impl AuthProvider {
    /// Create a provider with its own reqwest transport
    pub fn new(config: AuthConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(concat!("restload/", env!("CARGO_PKG_VERSION")))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a provider that sends token requests through `transport`
    pub fn with_transport(config: AuthConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            slot: Arc::new(RwLock::new(TokenSlot::Empty)),
            transport,
            timeout: Duration::from_secs(30),
        }
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Whether `refresh` can produce a different credential
    pub fn is_refreshable(&self) -> bool {
        self.config.is_token_based()
    }

    /// Get a valid credential, acquiring one if none is cached or it expired
    pub async fn acquire(&self) -> Result<Credential> {
        if let Some(credential) = self.static_credential() {
            return Ok(credential);
        }

        {
            let slot = self.slot.read().await;
            match &*slot {
                TokenSlot::Ready(credential) if !credential.is_expired() => {
                    return Ok(credential.clone());
                }
                TokenSlot::Rejected(message) => return Err(Error::credential(message.clone())),
                _ => {}
            }
        }

        let mut slot = self.slot.write().await;

        // Another task may have finished the token request while we waited
        let previous = match &*slot {
            TokenSlot::Ready(credential) if !credential.is_expired() => {
                return Ok(credential.clone());
            }
            TokenSlot::Rejected(message) => return Err(Error::credential(message.clone())),
            TokenSlot::Ready(credential) => Some(credential.clone()),
            TokenSlot::Empty => None,
        };

        self.fetch_into(&mut *slot, previous.as_ref()).await
    }

    /// Replace `old` with a fresh credential.
    ///
    /// If another caller already replaced `old`, the newer cached credential is
    /// returned without issuing another token request. Static strategies
    /// return `old` unchanged.
    pub async fn refresh(&self, old: &Credential) -> Result<Credential> {
        if !self.is_refreshable() {
            return Ok(old.clone());
        }

        let mut slot = self.slot.write().await;
        match &*slot {
            TokenSlot::Ready(current) if current.token != old.token && !current.is_expired() => {
                return Ok(current.clone());
            }
            TokenSlot::Rejected(message) => return Err(Error::credential(message.clone())),
            _ => {}
        }

        info!(auth = self.config.kind(), "Refreshing access token");
        self.fetch_into(&mut *slot, Some(old)).await
    }

    /// Acquire a credential and attach it to `request`
    pub async fn apply(&self, request: &mut HttpRequest) -> Result<Credential> {
        let credential = self.acquire().await?;
        self.attach(request, &credential);
        Ok(credential)
    }

    /// Attach an already acquired credential to `request`
    pub fn attach(&self, request: &mut HttpRequest, credential: &Credential) {
        match &self.config {
            AuthConfig::None => {}
            AuthConfig::ApiKey {
                location,
                name,
                prefix,
                ..
            } => {
                let value = format!("{}{}", prefix.as_deref().unwrap_or(""), credential.token);
                match location {
                    Location::Header => request.set_header(name.clone(), value),
                    Location::Query => request.set_query(name.clone(), value),
                }
            }
            AuthConfig::Basic { .. } => {
                request.set_header("Authorization", format!("Basic {}", credential.token));
            }
            AuthConfig::Bearer { .. }
            | AuthConfig::OAuth2ClientCredentials { .. }
            | AuthConfig::OAuth2Refresh { .. } => {
                request.set_header("Authorization", format!("Bearer {}", credential.token));
            }
        }
    }

    /// Credential for the strategies that never talk to a token endpoint
    fn static_credential(&self) -> Option<Credential> {
        match &self.config {
            AuthConfig::None => Some(Credential::new("")),
            AuthConfig::ApiKey { value, .. } => Some(Credential::new(value.clone())),
            AuthConfig::Basic { username, password } => Some(Credential::new(basic_token(
                username, password,
            ))),
            AuthConfig::Bearer { token } => Some(Credential::new(token.clone())),
            AuthConfig::OAuth2ClientCredentials { .. } | AuthConfig::OAuth2Refresh { .. } => None,
        }
    }

    /// Run the token request and store its outcome in the (locked) slot
    async fn fetch_into(
        &self,
        slot: &mut TokenSlot,
        previous: Option<&Credential>,
    ) -> Result<Credential> {
        match self.fetch_token(previous).await {
            Ok(credential) => {
                *slot = TokenSlot::Ready(credential.clone());
                Ok(credential)
            }
            Err(Error::Credential { message }) => {
                warn!(auth = self.config.kind(), "Token request rejected: {message}");
                *slot = TokenSlot::Rejected(message.clone());
                Err(Error::Credential { message })
            }
            Err(e) => Err(e),
        }
    }

    /// Issue the token request for the configured flow
    async fn fetch_token(&self, previous: Option<&Credential>) -> Result<Credential> {
        let request = match &self.config {
            AuthConfig::OAuth2ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scopes,
                token_body,
                client_auth,
            } => {
                let mut form: Vec<(String, String)> = Vec::new();
                if !token_body.contains_key("grant_type") {
                    form.push(("grant_type".into(), "client_credentials".into()));
                }
                for (key, value) in token_body {
                    form.push((key.clone(), value.clone()));
                }
                if !scopes.is_empty() {
                    form.push(("scope".into(), scopes.join(" ")));
                }

                let mut request = HttpRequest::post(token_url.clone());
                match client_auth {
                    ClientAuth::Body => {
                        form.push(("client_id".into(), client_id.clone()));
                        form.push(("client_secret".into(), client_secret.clone()));
                    }
                    ClientAuth::BasicHeader => {
                        request.set_header(
                            "Authorization",
                            format!("Basic {}", basic_token(client_id, client_secret)),
                        );
                    }
                }
                request.form(form)
            }

            AuthConfig::OAuth2Refresh {
                token_url,
                client_id,
                client_secret,
                refresh_token,
            } => {
                // Prefer a rotated refresh token from the previous response
                let refresh_token = previous
                    .and_then(|c| c.refresh_token.clone())
                    .unwrap_or_else(|| refresh_token.clone());
                HttpRequest::post(token_url.clone()).form(vec![
                    ("grant_type".into(), "refresh_token".into()),
                    ("client_id".into(), client_id.clone()),
                    ("client_secret".into(), client_secret.clone()),
                    ("refresh_token".into(), refresh_token),
                ])
            }

            _ => {
                return Err(Error::credential(
                    "Token requests are not supported for this auth type",
                ))
            }
        };

        debug!(url = %request.url, "Requesting access token");
        let response = self.transport.send(&request, self.timeout).await?;
        parse_token_response(&response)
    }
}

impl std::fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProvider")
            .field("kind", &self.config.kind())
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

fn parse_token_response(response: &HttpResponse) -> Result<Credential> {
    if !response.is_success() {
        return Err(Error::credential(format!(
            "Token request failed with status {}: {}",
            response.status, response.body
        )));
    }

    let token: TokenResponse = serde_json::from_str(&response.body)
        .map_err(|e| Error::credential(format!("Malformed token response: {e}")))?;

    let mut credential = match token.expires_in {
        Some(secs) => Credential::expires_in(token.access_token, secs),
        None => Credential::new(token.access_token),
    };
    credential.refresh_token = token.refresh_token;
    Ok(credential)
}

/// base64("user:password")
pub fn basic_token(username: &str, password: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"))
}
