//! Bearer token lifecycle.
//!
//! One token slot per campaign, persisted under `{ACTID}_token` with no
//! client-side expiry:
//!
//! ```text
//! absent --fetch_token()--> valid --"Unauthorized"--> rejected --> absent
//! ```
//!
//! Rejection deletes the stored token immediately, so `rejected` is never
//! observed from outside.

use std::sync::Arc;

use reqwest::Method;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::store::{PersistentStore, Ttl};
use crate::transport::Transport;

/// Token issuance endpoint, relative to the backend base URL.
pub const AUTH_TOKEN_ENDPOINT: &str = "api/auth_token_get";

const DEFAULT_DENIAL: &str = "Failed to get a valid token.";

/// Supplies the campaign password at request time. The host owns the
/// secret; this crate never embeds one.
pub trait PasswordProvider: Send + Sync {
    /// `None` when no password is available.
    fn password(&self) -> Option<String>;
}

impl<F> PasswordProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn password(&self) -> Option<String> {
        self()
    }
}

/// Reads the password from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvPassword {
    var: String,
}

impl EnvPassword {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl PasswordProvider for EnvPassword {
    fn password(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|p| !p.is_empty())
    }
}

/// Observable state of the token slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
}

impl TokenState {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenState::Absent => "absent",
            TokenState::Valid => "valid",
        }
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acquires, caches and drops the campaign bearer token.
pub struct TokenManager {
    transport: Transport,
    store: Arc<dyn PersistentStore>,
    token_key: String,
    actid: String,
    password: Arc<dyn PasswordProvider>,
}

impl TokenManager {
    pub fn new(
        transport: Transport,
        store: Arc<dyn PersistentStore>,
        actid: impl Into<String>,
        token_key: impl Into<String>,
        password: Arc<dyn PasswordProvider>,
    ) -> Self {
        Self {
            transport,
            store,
            token_key: token_key.into(),
            actid: actid.into(),
            password,
        }
    }

    /// Stored token, if any. Empty values count as absent.
    pub fn current_token(&self) -> Option<String> {
        self.store
            .get(&self.token_key)
            .filter(|token| !token.is_empty())
    }

    pub fn token_state(&self) -> TokenState {
        match self.current_token() {
            Some(_) => TokenState::Valid,
            None => TokenState::Absent,
        }
    }

    /// Requests a new token and stores it without expiry.
    ///
    /// Sent without a bearer credential and never retried.
    pub async fn fetch_token(&self) -> ApiResult<String> {
        let pwd = self.password.password().ok_or_else(|| {
            ApiError::AuthFailure("no password available for token request".to_string())
        })?;
        let body = json!({ "actid": self.actid, "pwd": pwd });

        let response = self
            .transport
            .send(AUTH_TOKEN_ENDPOINT, &Method::POST, Some(&body), None)
            .await?;

        if !response.is_success() {
            let reason = response.msg.unwrap_or_else(|| DEFAULT_DENIAL.to_string());
            tracing::warn!("token request for {} denied: {reason}", self.actid);
            return Err(ApiError::AuthFailure(reason));
        }

        let token = response
            .get("token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::AuthFailure(DEFAULT_DENIAL.to_string()))?
            .to_string();

        if let Err(e) = self.store.set(&self.token_key, &token, Ttl::Indefinite) {
            tracing::warn!("failed to store bearer token: {e}");
        }
        tracing::info!("obtained bearer token for {}", self.actid);
        Ok(token)
    }

    /// Returns the stored token, fetching one (at most once) when absent.
    pub async fn check_and_get_token(&self) -> ApiResult<String> {
        if let Some(token) = self.current_token() {
            return Ok(token);
        }
        tracing::debug!("no stored token, requesting one");
        self.fetch_token().await
    }

    /// Drops the stored token after the backend rejected it.
    pub fn invalidate(&self) {
        tracing::warn!("bearer token rejected, discarding");
        if let Err(e) = self.store.delete(&self.token_key) {
            tracing::warn!("failed to delete rejected token: {e}");
        }
    }
}
