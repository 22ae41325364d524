//! `OAuth2` token types and headless refresh.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Default token endpoint for Google `OAuth2`.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// `OAuth2` access token with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Access token string.
    pub access_token: String,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Expiration time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Scope granted by the authorization server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at: None,
            scope: None,
        }
    }

    /// Sets the expiration time.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Checks if the token is expired (with 60 second buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| Utc::now() + Duration::seconds(60) >= exp)
    }

    /// Returns true if the token is valid (not expired).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }
}

/// Token response from the `OAuth2` server.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type.
    pub token_type: String,
    /// Expires in seconds.
    pub expires_in: Option<u32>,
    /// Scope.
    pub scope: Option<String>,
}

impl From<TokenResponse> for Token {
    fn from(response: TokenResponse) -> Self {
        let expires_at = response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(i64::from(secs)));

        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at,
            scope: response.scope,
        }
    }
}

/// Error response from the `OAuth2` server.
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Long-lived client credentials for headless token refresh.
///
/// A scheduled job never runs an interactive consent flow; it holds a refresh
/// token obtained out of band and exchanges it for short-lived access tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Client ID from the provider console.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Token endpoint; defaults to Google's.
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

impl Credentials {
    /// Exchanges the refresh token for a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the grant is rejected, or a transport error
    /// if the endpoint is unreachable.
    pub async fn refresh(&self, http: &Client) -> Result<Token> {
        if self.refresh_token.is_empty() {
            return Err(Error::NoRefreshToken);
        }

        let token_url = Url::parse(&self.token_url)?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", self.refresh_token.as_str());
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());

        let response = http.post(token_url).form(&params).send().await?;

        if response.status().is_success() {
            let token_response: TokenResponse = response.json().await?;
            debug!("Access token refreshed");
            Ok(token_response.into())
        } else {
            let error: ErrorResponse = response.json().await.map_err(|e| {
                Error::InvalidResponse(format!("Unparseable token error response: {e}"))
            })?;
            Err(Error::Auth(format!(
                "{}: {}",
                error.error, error.error_description
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new("access123", "Bearer");
        assert_eq!(token.access_token, "access123");
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_none());
    }

    #[test]
    fn test_token_expiration() {
        let expired =
            Token::new("access123", "Bearer").with_expires_at(Utc::now() - Duration::seconds(120));
        assert!(expired.is_expired());
        assert!(!expired.is_valid());

        let valid =
            Token::new("access123", "Bearer").with_expires_at(Utc::now() + Duration::seconds(3600));
        assert!(!valid.is_expired());
        assert!(valid.is_valid());
    }

    #[test]
    fn test_token_expiry_buffer() {
        // Tokens within the 60 second buffer count as expired.
        let nearly =
            Token::new("access123", "Bearer").with_expires_at(Utc::now() + Duration::seconds(30));
        assert!(nearly.is_expired());
    }

    #[test]
    fn test_token_from_response() {
        let response = TokenResponse {
            access_token: "test_token".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            scope: Some("photoslibrary".to_string()),
        };

        let token: Token = response.into();
        assert_eq!(token.access_token, "test_token");
        assert!(token.expires_at.is_some());
        assert!(token.is_valid());
    }

    #[test]
    fn test_credentials_deserialize_with_default_url() {
        let creds: Credentials = serde_json::from_str(
            r#"{"client_id": "id", "client_secret": "secret", "refresh_token": "rt"}"#,
        )
        .unwrap();
        assert_eq!(creds.token_url, GOOGLE_TOKEN_URL);
    }
}
