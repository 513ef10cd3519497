//! Google OAuth 2.0 refresh-token exchange.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use screener_core::{Error, ExchangedToken, Result, TokenExchange};
use serde::Deserialize;

use crate::http::{build_client, status_error};

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl GoogleOAuthClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

fn parse_token_response(status: StatusCode, body: &str) -> Result<ExchangedToken> {
    if !status.is_success() {
        // `invalid_grant` means the refresh token was revoked or expired.
        if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(body) {
            let msg = match err.error_description {
                Some(d) => format!("token exchange rejected: {} ({d})", err.error),
                None => format!("token exchange rejected: {}", err.error),
            };
            return Err(if status.is_client_error() {
                Error::Unauthorized(msg)
            } else {
                Error::BackendMessage(msg)
            });
        }
        return Err(status_error("token exchange", status, body));
    }

    let token: TokenResponse = serde_json::from_str(body)
        .map_err(|e| Error::InvalidResponse(format!("token response: {e}")))?;
    if token.access_token.trim().is_empty() {
        return Err(Error::InvalidResponse(
            "token response has an empty access_token".to_string(),
        ));
    }
    Ok(ExchangedToken {
        access_token: token.access_token,
        refresh_token: token.refresh_token.filter(|t| !t.trim().is_empty()),
    })
}

#[async_trait]
impl TokenExchange for GoogleOAuthClient {
    #[tracing::instrument(level = "debug", skip_all)]
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<ExchangedToken> {
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(Error::backend_reqwest)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::backend_reqwest)?;
        parse_token_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn access_token_without_rotation() {
        let body = r#"{"access_token":"ya29.new","expires_in":3599,"scope":"https://www.googleapis.com/auth/spreadsheets","token_type":"Bearer"}"#;
        let t = parse_token_response(StatusCode::OK, body).unwrap();
        assert_eq!(t.access_token, "ya29.new");
        assert_eq!(t.refresh_token, None);
    }

    #[test]
    fn rotated_refresh_token_is_surfaced() {
        let body = r#"{"access_token":"ya29.new","refresh_token":"1//rotated","expires_in":3599}"#;
        let t = parse_token_response(StatusCode::OK, body).unwrap();
        assert_eq!(t.refresh_token.as_deref(), Some("1//rotated"));
    }

    #[test]
    fn invalid_grant_is_unauthorized() {
        let body = r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#;
        let err = parse_token_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(ref m) if m.contains("invalid_grant")));
    }

    #[test]
    fn unexpected_bodies_are_errors() {
        assert!(matches!(
            parse_token_response(StatusCode::OK, "<html>"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_token_response(StatusCode::BAD_GATEWAY, "upstream down"),
            Err(Error::BackendMessage(_))
        ));
    }
    #[tokio::test]
    async fn exchange_posts_refresh_grant_form() {
        let (base_url, server) =
            serve_once(200, r#"{"access_token":"ya29.fresh","expires_in":3599,"token_type":"Bearer"}"#).await;
        let client = GoogleOAuthClient::new("client-id", "client-secret")
            .unwrap()
            .with_token_url(format!("{base_url}/token"));

        let token = client.exchange_refresh_token("1//refresh").await.unwrap();
        assert_eq!(token.access_token, "ya29.fresh");
        assert_eq!(token.refresh_token, None);

        let req = server.await.unwrap();
        assert_eq!(req.request_line(), "POST /token HTTP/1.1");
        assert_eq!(
            req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert!(req.body.contains("grant_type=refresh_token"));
        assert!(req.body.contains("refresh_token=1%2F%2Frefresh"));
        assert!(req.body.contains("client_id=client-id"));
    }
}
