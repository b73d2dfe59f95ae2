use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::request::send_once;

#[derive(Debug, Serialize)]
pub struct PasswordGrant<'a> {
    pub grant_type: &'static str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub scope: &'a str,
}

impl<'a> PasswordGrant<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self {
            grant_type: "password",
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            username: &credentials.username,
            password: &credentials.password,
            scope: credentials.scope(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshGrant<'a> {
    pub grant_type: &'static str,
    pub refresh_token: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

impl<'a> RefreshGrant<'a> {
    pub fn new(credentials: &'a Credentials, refresh_token: &'a str) -> Self {
        Self {
            grant_type: "refresh_token",
            refresh_token,
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<Value>,
}

impl TokenResponse {
    /// When the token should be refreshed, if the server said it expires.
    pub fn refresh_delay(&self) -> Option<Duration> {
        match self.expires_in {
            Some(seconds) if seconds > 0 => Some(Duration::from_secs(seconds)),
            _ => None,
        }
    }
}

/// Exchanges the account password for a token pair.
pub async fn password_grant(
    client: &reqwest::Client,
    base_url: &str,
    credentials: &Credentials,
) -> Result<TokenResponse> {
    debug!("Requesting password grant for user: {}", credentials.username);
    request_token(
        client,
        base_url,
        &PasswordGrant::new(credentials),
        "Authenticate error",
    )
    .await
}

/// Exchanges a refresh token for a new token pair.
pub async fn refresh_grant(
    client: &reqwest::Client,
    base_url: &str,
    credentials: &Credentials,
    refresh_token: &str,
) -> Result<TokenResponse> {
    debug!("Requesting refresh grant");
    request_token(
        client,
        base_url,
        &RefreshGrant::new(credentials, refresh_token),
        "Authenticate refresh error",
    )
    .await
}

async fn request_token<F: Serialize + ?Sized>(
    client: &reqwest::Client,
    base_url: &str,
    form: &F,
    context: &str,
) -> Result<TokenResponse> {
    let request = client.post(format!("{}/oauth2/token", base_url)).form(form);

    let response = send_once(request)
        .await
        .map_err(|reason| Error::Auth(format!("{}: {}", context, reason)))?;

    let response_text = response.text().await?;
    match serde_json::from_str::<TokenResponse>(&response_text) {
        Ok(token) => {
            debug!(
                "Token granted, expires in {:?}s",
                token.expires_in.unwrap_or_default()
            );
            Ok(token)
        }
        Err(e) => {
            debug!("Failed to parse token response: {}", e);
            Err(Error::Auth(format!(
                "{}: failed to parse token response: {}",
                context, e
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{"access_token":"544cf4071c7759831d94cdf9|fcb30814afbffd0e39381e74fe38a59a","refresh_token":"544cf4071c7759831d94cdf9|2b2c270c1208e8f67d3bd3891e395e1a","scope":["read_station"],"expires_in":10800,"expire_in":10800}"#;

        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            token.access_token,
            "544cf4071c7759831d94cdf9|fcb30814afbffd0e39381e74fe38a59a"
        );
        assert!(token.refresh_token.is_some());
        assert_eq!(token.refresh_delay(), Some(Duration::from_secs(10800)));
    }

    #[test]
    fn test_token_without_expiry_is_not_refreshed() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert!(token.refresh_token.is_none());
        assert_eq!(token.refresh_delay(), None);

        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":0}"#).unwrap();
        assert_eq!(token.refresh_delay(), None);
    }

    #[test]
    fn test_password_grant_form() {
        let credentials = Credentials::new("id", "secret", "me@example.com", "hunter2");
        let form = serde_json::to_value(PasswordGrant::new(&credentials)).unwrap();

        assert_eq!(form["grant_type"], "password");
        assert_eq!(form["client_id"], "id");
        assert_eq!(form["username"], "me@example.com");
        assert_eq!(form["scope"], crate::config::DEFAULT_SCOPE);
    }

    #[test]
    fn test_refresh_grant_form() {
        let credentials = Credentials::new("id", "secret", "me@example.com", "hunter2");
        let form = serde_json::to_value(RefreshGrant::new(&credentials, "refresh-1")).unwrap();

        assert_eq!(form["grant_type"], "refresh_token");
        assert_eq!(form["refresh_token"], "refresh-1");
        assert_eq!(form["client_secret"], "secret");
        assert!(form.get("password").is_none());
    }
}
