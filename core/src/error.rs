use thiserror::Error;

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure or non-success HTTP status. Never retried.
    #[error("network error: {message}")]
    Network {
        /// HTTP status, when the server answered at all.
        status: Option<u16>,
        message: String,
    },

    /// Token issuance denied, or the backend rejected a freshly issued
    /// token as well.
    #[error("authorization failed: {0}")]
    AuthFailure(String),

    /// The server answered 2xx with a body that is not a JSON object.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Endpoint could not be resolved against the base URL.
    #[error("invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },
}

impl ApiError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthFailure(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Network { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Result type for backend calls.
pub type ApiResult<T> = Result<T, ApiError>;
