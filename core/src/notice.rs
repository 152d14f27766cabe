//! User-facing messages for failures.

use std::fmt;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    AuthFailure,
    Network,
    /// The QR scanner could not use the camera.
    Camera,
}

/// A modal-style message: short title plus detail text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self.kind {
            NoticeKind::AuthFailure => "Authorization failed",
            NoticeKind::Network => "Network or server error",
            NoticeKind::Camera => "Camera error",
        }
    }

    pub fn camera(error_name: &str) -> Self {
        Notice {
            kind: NoticeKind::Camera,
            text: media_error_message(error_name),
        }
    }
}

impl From<&ApiError> for Notice {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::AuthFailure(msg) => Notice {
                kind: NoticeKind::AuthFailure,
                text: msg.clone(),
            },
            ApiError::Network { message, .. } => Notice {
                kind: NoticeKind::Network,
                text: message.clone(),
            },
            other => Notice {
                kind: NoticeKind::Network,
                text: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title(), self.text)
    }
}

/// Message for a camera/media error name, as reported by the capture API.
pub fn media_error_message(name: &str) -> String {
    match name {
        "OverconstrainedError" => {
            "The camera hardware is not supported or reported an error. Please refresh the page."
                .to_string()
        }
        "AbortError" => {
            "The camera operation was aborted. Please check the camera permissions.".to_string()
        }
        "SecurityError" | "NotAllowedError" => {
            "Camera access was denied. Please allow camera access and try again.".to_string()
        }
        "NotFoundError" => "No camera device was found.".to_string(),
        other => format!("An unexpected error occurred: {other}"),
    }
}
