//! Authorized requests with a single silent token refresh.
//!
//! ```text
//! attempt 1: token (fetched if absent) -> request
//!            "Unauthorized" -> drop token
//! attempt 2: token (fetched once)      -> same request
//!            "Unauthorized" -> AuthFailure
//! ```
//!
//! The attempt count is a bounded loop, so a misbehaving backend can cost
//! at most two requests and one token fetch per call.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use crate::auth::{PasswordProvider, TokenManager};
use crate::config::{CampaignConfig, ConfigError};
use crate::error::{ApiError, ApiResult};
use crate::store::PersistentStore;
use crate::transport::{ApiResponse, Transport};

/// Upper bound on requests per authorized call.
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Attach the campaign bearer token.
    pub needs_token: bool,
    /// Allow one refresh-and-retry after an "Unauthorized" answer.
    pub retry: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::POST,
            needs_token: true,
            retry: true,
        }
    }
}

impl RequestOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn without_token(mut self) -> Self {
        self.needs_token = false;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }
}

/// Backend client for one campaign.
pub struct ApiClient {
    transport: Transport,
    tokens: TokenManager,
}

impl ApiClient {
    pub fn new(transport: Transport, tokens: TokenManager) -> Self {
        Self { transport, tokens }
    }

    /// Wires transport and token manager from the campaign config.
    pub fn from_config(
        config: &CampaignConfig,
        store: Arc<dyn PersistentStore>,
        password: Arc<dyn PasswordProvider>,
    ) -> Result<Self, ConfigError> {
        let transport = Transport::new(config.base_url()?);
        let tokens = TokenManager::new(
            transport.clone(),
            store,
            config.actid.clone(),
            config.store_keys().token(),
            password,
        );
        Ok(Self::new(transport, tokens))
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Sends `body` to `endpoint`, refreshing the token and retrying once
    /// if the backend answers `{status: false, msg: "Unauthorized"}`.
    ///
    /// Transport and HTTP failures surface as [`ApiError::Network`] and are
    /// never retried.
    pub async fn authorized_request(
        &self,
        endpoint: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> ApiResult<ApiResponse> {
        // A tokenless request gains nothing from a refreshed token.
        let attempts = if options.retry && options.needs_token {
            MAX_ATTEMPTS
        } else {
            1
        };

        for attempt in 1..=attempts {
            let bearer = if options.needs_token {
                Some(self.tokens.check_and_get_token().await?)
            } else {
                None
            };

            let response = self
                .transport
                .send(endpoint, &options.method, body, bearer.as_deref())
                .await?;
            if !response.is_unauthorized() {
                return Ok(response);
            }

            if options.needs_token {
                self.tokens.invalidate();
            }
            if attempt < attempts {
                tracing::warn!("{endpoint}: token expired or invalid, refreshing and retrying");
            }
        }

        Err(ApiError::AuthFailure(format!(
            "{endpoint} rejected the request as unauthorized"
        )))
    }

    /// POST with token and retry.
    pub async fn post_data(&self, endpoint: &str, body: &Value) -> ApiResult<ApiResponse> {
        self.authorized_request(endpoint, Some(body), RequestOptions::default())
            .await
    }
}
