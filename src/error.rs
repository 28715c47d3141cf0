//! Error type for the fallible edges of the crate.
//!
//! The replay pipeline itself never fails: malformed samples are dropped and
//! degenerate paths produce empty models. Errors only arise when parsing
//! configuration or talking to the trip API.

use thiserror::Error;

/// Errors raised by configuration parsing and the trip API client.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A configuration value is out of its accepted range.
    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// A JSON payload could not be decoded.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// The trip API answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// The request could not be sent or its body could not be read.
    #[error("request error: {0}")]
    Request(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReplayError>;

impl ReplayError {
    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        ReplayError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = ReplayError::invalid_config("min_distance_meters", "must be finite");
        let msg = err.to_string();
        assert!(msg.contains("min_distance_meters"));
        assert!(msg.contains("must be finite"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: ReplayError = parse.unwrap_err().into();
        assert!(matches!(err, ReplayError::Json(_)));
    }

    #[test]
    fn test_http_display() {
        let err = ReplayError::Http {
            url: "http://localhost:5000/trips".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 from http://localhost:5000/trips");
    }
}
