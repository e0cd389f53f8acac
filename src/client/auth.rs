//! Login exchange.
//!
//! The service account trades its email and key for a bearer token once,
//! when the provider is configured. The token is never refreshed mid-run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProviderError;
use crate::types::{API_VERSION, LOGIN_TIMEOUT};

use super::transport::{error_from_response, HttpTransport};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    web: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: String,
}

/// Log in and return the bearer token.
pub async fn login(
    http: &reqwest::Client,
    base: &Url,
    email: &str,
    key: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let url = format!(
        "{}/{}/auth/login",
        base.as_str().trim_end_matches('/'),
        API_VERSION
    );
    tracing::debug!(email, "logging in");

    let response = http
        .post(url)
        .timeout(timeout)
        .json(&LoginRequest {
            email,
            password: key,
            web: true,
        })
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProviderError::DeadlineExceeded(format!("login timed out after {:?}", timeout))
            } else {
                ProviderError::Unavailable(format!("login request failed: {}", e))
            }
        })?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let err = error_from_response(status, &body);
        return Err(ProviderError::Unauthenticated(format!(
            "login as {} failed: {}",
            email,
            err.message()
        )));
    }

    let parsed: LoginResponse = serde_json::from_str(&body)?;
    if parsed.token.is_empty() {
        return Err(ProviderError::Unauthenticated(format!(
            "login as {} returned no token",
            email
        )));
    }
    Ok(parsed.token)
}

/// Log in and build the authenticated transport.
pub async fn connect(base: Url, email: &str, key: &str) -> Result<HttpTransport, ProviderError> {
    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let token = login(&http, &base, email, key, LOGIN_TIMEOUT).await?;
    tracing::info!(url = %base, "authenticated against Bytebase");
    Ok(HttpTransport::new(http, base, token))
}
