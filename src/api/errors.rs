use reqwest::StatusCode;
use thiserror::Error;
use validator::ValidationErrors;

use crate::schemas::SchemaError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed: {message}")]
    Network { path: String, message: String },
    #[error("request to {path} timed out")]
    Timeout { path: String },
    #[error("{path} returned {status}: {detail}")]
    Status { path: String, status: u16, detail: String },
    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("failed to build http client: {0}")]
    Client(String),
}

impl ApiError {
    pub(crate) fn from_transport(path: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout { path: path.to_string() };
        }
        Self::Network { path: path.to_string(), message: err.to_string() }
    }

    /// Transient failures worth another attempt: transport errors, timeouts,
    /// 5xx, 408 and 429. Anything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => {
                let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
                status.is_server_error()
                    || status == StatusCode::REQUEST_TIMEOUT
                    || status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Decode { .. } | Self::Schema(_) | Self::Validation(_) | Self::Client(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}

/// Pulls a human-readable message out of an error body.
pub(crate) fn extract_error_message(raw_body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw_body) else {
        let trimmed = raw_body.trim();
        return if trimmed.is_empty() { "empty response body".to_string() } else { trimmed.to_string() };
    };

    for key in ["detail", "message", "error", "msg"] {
        match parsed.get(key) {
            Some(serde_json::Value::String(value)) if !value.is_empty() => return value.clone(),
            Some(value @ serde_json::Value::Object(_)) | Some(value @ serde_json::Value::Array(_)) => {
                return value.to_string();
            }
            _ => {}
        }
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn status(code: u16) -> ApiError {
        ApiError::Status { path: "/x".to_string(), status: code, detail: String::new() }
    }

    #[test]
    fn retryable_classification() {
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(408).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(ApiError::Timeout { path: "/x".to_string() }.is_retryable());
        assert!(!ApiError::Validation("bad".to_string()).is_retryable());
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(extract_error_message(r#"{"detail":"Assessment closed"}"#), "Assessment closed");
        assert_eq!(extract_error_message(r#"{"message":"nope"}"#), "nope");
        assert_eq!(extract_error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(extract_error_message("  "), "empty response body");
        assert_eq!(extract_error_message(r#"{"errors":1}"#), r#"{"errors":1}"#);
    }

    #[test]
    fn validation_errors_collapse_to_one_message() {
        #[derive(Validate)]
        struct Form {
            #[validate(length(min = 1, message = "code is required"))]
            code: String,
            #[validate(range(min = 1, max = 3))]
            semester: u8,
        }

        let err: ApiError = Form { code: String::new(), semester: 9 }.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "validation failed: code is required; semester is invalid");
    }
}
