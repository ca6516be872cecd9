// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-endpoint request authentication.
//!
//! Precedence: OAuth client-credentials bearer (fetched lazily, cached until
//! expiry) > explicit API-key header > Authorization Bearer > Basic. Exactly
//! one Authorization value is emitted.

use sentra_core::ApiAuth;
use sentra_vault::CredentialSet;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Cache for one connector's OAuth access token.
#[derive(Default)]
pub struct OAuthCache {
    inner: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3_600
}

impl OAuthCache {
    /// Current token, fetching via the client-credentials grant when absent
    /// or expired. The client id/secret come from the credential set
    /// (`apiKey`/`apiSecret`, falling back to `username`/`password`).
    pub async fn bearer(
        &self,
        client: &reqwest::Client,
        token_url: &str,
        scopes: &[String],
        credentials: &CredentialSet,
    ) -> Result<String, String> {
        let mut cached = self.inner.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let client_id = credentials
            .api_key
            .clone()
            .or_else(|| credentials.username.clone())
            .ok_or_else(|| "oauth: no client id in credentials".to_string())?;
        let client_secret = credentials
            .api_secret
            .clone()
            .or_else(|| credentials.password.clone())
            .ok_or_else(|| "oauth: no client secret in credentials".to_string())?;

        let mut form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), client_id),
            ("client_secret".to_string(), client_secret),
        ];
        if !scopes.is_empty() {
            form.push(("scope".to_string(), scopes.join(" ")));
        }

        debug!(%token_url, "fetching oauth token");
        let response = client
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("oauth token fetch: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("oauth token endpoint returned {}", response.status()));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("oauth token body: {e}"))?;

        // Refresh one minute early to avoid using a token at the edge.
        let ttl = token.expires_in.saturating_sub(60).max(30);
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + std::time::Duration::from_secs(ttl),
        });
        Ok(token.access_token)
    }

    /// Drop the cached token (config change).
    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }
}

/// Apply endpoint auth to a request. `oauth_bearer` is the token already
/// resolved by the caller for OAuth endpoints.
pub fn apply_auth(
    request: reqwest::RequestBuilder,
    auth: &ApiAuth,
    credentials: &CredentialSet,
    oauth_bearer: Option<&str>,
) -> reqwest::RequestBuilder {
    match auth {
        ApiAuth::OAuth { .. } => match oauth_bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        },
        ApiAuth::ApiKey { header } => match &credentials.api_key {
            Some(key) => request.header(header.as_str(), key.as_str()),
            None => request,
        },
        ApiAuth::Bearer => {
            match credentials.token.as_ref().or(credentials.access_token.as_ref()) {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        }
        ApiAuth::Basic => match (&credentials.username, &credentials.password) {
            (Some(user), Some(pass)) => request.basic_auth(user, Some(pass)),
            _ => request,
        },
        ApiAuth::None => request,
    }
}
