//! Error types for the API client

use serde_json::Value;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by `ApiClient` calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, TLS, body read)
    #[error("network error: {message}")]
    Network { message: String },

    /// The backend answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A 401 could not be recovered because the refresh exchange failed.
    /// The session has been cleared when this is returned.
    #[error("session expired, token refresh failed: {source}")]
    RefreshFailed {
        #[source]
        source: Box<ApiError>,
    },

    /// A request body could not be encoded or a response body decoded
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Session tokens could not be persisted
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network {
            message: err.to_string(),
        }
    }
}

impl ApiError {
    /// HTTP status of a backend rejection, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Joins backend field validation errors into display lines
    ///
    /// A body like `{"title": ["This field is required."]}` becomes
    /// `title: This field is required.`. Returns `None` when the error is not
    /// an HTTP rejection with a JSON object body.
    pub fn field_errors(&self) -> Option<String> {
        let ApiError::Http { body, .. } = self else {
            return None;
        };
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
            return None;
        };

        let lines: Vec<String> = fields
            .iter()
            .map(|(key, value)| format!("{}: {}", key, display_value(value)))
            .collect();
        Some(lines.join("\n"))
    }
}

/// Renders a JSON value the way a form error banner shows it: strings bare,
/// arrays comma-joined
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> ApiError {
        ApiError::Http {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_status_and_unauthorized() {
        assert_eq!(http(401, "").status(), Some(401));
        assert!(http(401, "").is_unauthorized());
        assert!(!http(403, "").is_unauthorized());
        let network = ApiError::Network {
            message: "connection refused".to_string(),
        };
        assert!(network.status().is_none());
    }

    #[test]
    fn test_field_errors_joins_lines() {
        let err = http(
            400,
            r#"{"title":["This field is required."],"severity":["\"extreme\" is not a valid choice.","second"]}"#,
        );
        let message = err.field_errors().expect("field errors");
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"title: This field is required."));
        assert!(lines.contains(&"severity: \"extreme\" is not a valid choice.,second"));
    }

    #[test]
    fn test_field_errors_plain_string_value() {
        let err = http(403, r#"{"detail":"Authentication credentials were not provided."}"#);
        assert_eq!(
            err.field_errors().as_deref(),
            Some("detail: Authentication credentials were not provided.")
        );
    }

    #[test]
    fn test_field_errors_non_object_body() {
        assert!(http(500, "<html>oops</html>").field_errors().is_none());
        assert!(http(500, "[1,2]").field_errors().is_none());
    }

    #[test]
    fn test_refresh_failed_keeps_source() {
        let err = ApiError::RefreshFailed {
            source: Box::new(http(401, r#"{"detail":"Token is invalid or expired"}"#)),
        };
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("HTTP 401"));
        assert!(err.to_string().contains("token refresh failed"));
    }
}
