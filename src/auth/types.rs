//! Auth configuration types
//!
//! These types represent the auth strategy of a pipeline after template
//! interpolation has been applied, and the credential a provider hands out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// How OAuth2 client credentials are presented to the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuth {
    /// `client_id` / `client_secret` form fields
    #[default]
    Body,
    /// `Authorization: Basic base64(client_id:client_secret)`
    BasicHeader,
}

/// Authentication strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// API Key authentication (header or query)
    ApiKey {
        /// Where to place the API key
        #[serde(default)]
        location: Location,
        /// Header or query parameter name
        #[serde(default = "default_api_key_name")]
        name: String,
        /// Prefix to add before the value (e.g., "Token ")
        #[serde(default)]
        prefix: Option<String>,
        /// The API key value
        value: String,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        #[serde(default)]
        password: String,
    },

    /// Bearer token authentication
    Bearer {
        /// The bearer token
        token: String,
    },

    /// OAuth2 client credentials flow (also covers provider-specific grants
    /// such as account credentials via `token_body`)
    #[serde(rename = "oauth2_client_credentials")]
    OAuth2ClientCredentials {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Requested scopes
        #[serde(default)]
        scopes: Vec<String>,
        /// Additional token request form fields
        #[serde(default)]
        token_body: BTreeMap<String, String>,
        /// How the client id/secret are sent
        #[serde(default)]
        client_auth: ClientAuth,
    },

    /// OAuth2 refresh token flow
    #[serde(rename = "oauth2_refresh_token")]
    OAuth2Refresh {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Refresh token
        refresh_token: String,
    },
}

fn default_api_key_name() -> String {
    "Authorization".to_string()
}

impl AuthConfig {
    /// Whether credentials come from a token endpoint (and can be refreshed)
    pub fn is_token_based(&self) -> bool {
        matches!(
            self,
            AuthConfig::OAuth2ClientCredentials { .. } | AuthConfig::OAuth2Refresh { .. }
        )
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::OAuth2ClientCredentials { .. } => "oauth2_client_credentials",
            AuthConfig::OAuth2Refresh { .. } => "oauth2_refresh_token",
        }
    }
}

/// A credential handed out by an auth provider.
///
/// Owned by the provider that produced it; never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Token (or encoded static secret)
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh material returned by the token endpoint
    pub refresh_token: Option<String>,
}

impl Credential {
    /// A credential that never expires
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
            refresh_token: None,
        }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: impl Into<String>, seconds: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(seconds)),
            refresh_token: None,
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(30) >= expires_at,
            None => false,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_credential_not_expired() {
        assert!(!Credential::expires_in("t", 3600).is_expired());
    }

    #[test]
    fn test_credential_expired_within_buffer() {
        assert!(Credential::expires_in("t", 10).is_expired());
        assert!(Credential::expires_in("t", -100).is_expired());
    }

    #[test]
    fn test_credential_no_expiration() {
        assert!(!Credential::new("t").is_expired());
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let debug = format!("{:?}", Credential::new("super-secret"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_auth_config_from_yaml() {
        let config: AuthConfig = serde_yaml::from_str(
            r"
type: oauth2_client_credentials
token_url: https://zoom.us/oauth/token
client_id: id
client_secret: secret
client_auth: basic_header
token_body:
  grant_type: account_credentials
  account_id: acc
",
        )
        .unwrap();

        assert!(config.is_token_based());
        assert_eq!(config.kind(), "oauth2_client_credentials");
        if let AuthConfig::OAuth2ClientCredentials {
            client_auth,
            token_body,
            ..
        } = config
        {
            assert_eq!(client_auth, ClientAuth::BasicHeader);
            assert_eq!(token_body["grant_type"], "account_credentials");
        } else {
            panic!("Expected OAuth2ClientCredentials");
        }
    }

    #[test]
    fn test_auth_config_defaults() {
        assert!(matches!(AuthConfig::default(), AuthConfig::None));

        let config: AuthConfig =
            serde_yaml::from_str("type: api_key\nvalue: k123\nlocation: query\nname: apikey")
                .unwrap();
        assert_eq!(
            config,
            AuthConfig::ApiKey {
                location: Location::Query,
                name: "apikey".into(),
                prefix: None,
                value: "k123".into(),
            }
        );
    }
}
