//! Single HTTP round trip to the campaign backend.
//!
//! No token handling and no retries live here; see [`crate::client`] for
//! the authorized request loop.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{ApiError, ApiResult};

/// Message the backend uses to reject a bearer token.
pub const UNAUTHORIZED_MSG: &str = "Unauthorized";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application-level envelope: `{status, msg?, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Every other field of the payload.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ApiResponse {
    /// `status == false && msg == "Unauthorized"`.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(false) && self.msg.as_deref() == Some(UNAUTHORIZED_MSG)
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(true)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// HTTP client bound to a backend base URL.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
}

impl Transport {
    pub fn new(base_url: Url) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("stampcard/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });
        Self::with_client(http, base_url)
    }

    /// Uses a caller-built HTTP client.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: &str) -> ApiResult<Url> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|source| ApiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    /// Sends one request and decodes the envelope.
    pub async fn send(
        &self,
        endpoint: &str,
        method: &Method,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> ApiResult<ApiResponse> {
        let url = self.endpoint_url(endpoint)?;
        tracing::debug!("{method} {url} (bearer: {})", bearer.is_some());

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response.".to_string());
            tracing::warn!("{endpoint} answered HTTP {status}");
            return Err(ApiError::Network {
                status: Some(status.as_u16()),
                message: format!("HTTP error! Status: {}, Message: {text}", status.as_u16()),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("{endpoint} returned non-envelope body: {e}"))
        })
    }
}
