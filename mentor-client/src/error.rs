//! Error taxonomy for calls against the remote API.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Coarse classification used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Validation,
    Client,
    Server,
    Network,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication rejected: {0}")]
    Authentication(String),
    #[error("Access denied: {0}")]
    Authorization(String),
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field_errors: Vec<FieldError>,
    },
    #[error("Request rejected with HTTP {status}: {message}")]
    Client { status: u16, message: String },
    #[error("Server error HTTP {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Authorization(_) => ErrorCategory::Authorization,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Client { .. } => ErrorCategory::Client,
            Self::Server { .. } | Self::Decode(_) => ErrorCategory::Server,
            Self::Network(_) => ErrorCategory::Network,
        }
    }

    /// Worth retrying the same action later without changing input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Server | ErrorCategory::Network
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client { status: 404, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication(_) => Some(401),
            Self::Authorization(_) => Some(403),
            Self::Validation { .. } => Some(422),
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    /// Text shown to the user for this failure.
    ///
    /// `base_url` is mentioned for network failures so the user can tell
    /// connectivity problems apart from backend errors.
    pub fn user_message(&self, base_url: &str) -> String {
        match self {
            Self::Authentication(_) => "Session expired. Please sign in again.".to_string(),
            Self::Authorization(_) => "Access denied.".to_string(),
            Self::Validation {
                message,
                field_errors,
            } => field_errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| message.clone()),
            Self::Client { message, .. } => message.clone(),
            Self::Server { .. } => "Internal server error. Please try again.".to_string(),
            Self::Network(_) => {
                format!("Connection error. Check that the backend is reachable at {base_url}.")
            }
            Self::Decode(_) => "Unexpected response from the server.".to_string(),
        }
    }

    /// Classify a non-2xx response.
    pub fn from_response(status: u16, reason: Option<&str>, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(body_message)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && parsed.is_none() && trimmed.len() <= 200)
                    .then(|| trimmed.to_string())
            })
            .or_else(|| reason.map(ToString::to_string))
            .unwrap_or_else(|| "Request failed".to_string());
        let field_errors = parsed.as_ref().map(body_field_errors).unwrap_or_default();

        match status {
            401 => Self::Authentication(message),
            403 => Self::Authorization(message),
            422 => Self::Validation {
                message,
                field_errors,
            },
            400 if !field_errors.is_empty() => Self::Validation {
                message,
                field_errors,
            },
            500..=599 => Self::Server { status, message },
            _ => Self::Client { status, message },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

fn body_message(json: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Accepts `{"errors": {"field": "msg"}}` and
/// `{"fieldErrors": [{"field": "...", "message": "..."}]}`.
fn body_field_errors(json: &Value) -> Vec<FieldError> {
    if let Some(map) = json.get("errors").and_then(Value::as_object) {
        return map
            .iter()
            .filter_map(|(field, msg)| {
                let message = msg
                    .as_str()
                    .map(ToString::to_string)
                    .or_else(|| msg.as_array()?.first()?.as_str().map(ToString::to_string))?;
                Some(FieldError {
                    field: field.clone(),
                    message,
                })
            })
            .collect();
    }

    json.get("fieldErrors")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(FieldError {
                        field: item.get("field")?.as_str()?.to_string(),
                        message: item
                            .get("message")
                            .or_else(|| item.get("defaultMessage"))?
                            .as_str()?
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
