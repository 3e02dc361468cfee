//! Error types for the Perplexity client.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during client operations.
///
/// Precondition violations (`MissingKey`, `InvalidKey`, `EmptyQuery`,
/// `EmptyModel`, `ModelNotFound`) are raised locally, before any request is
/// dispatched. Transport failures are carried through `Api` and `Request`
/// with the provider's message preserved verbatim.
#[derive(Debug, Error)]
pub enum Error {
    /// No API key was provided.
    #[error("no API key provided")]
    MissingKey,

    /// API key failed syntactic validation.
    #[error("invalid API key: {0}")]
    InvalidKey(&'static str),

    /// Empty query passed to a query operation.
    #[error("query must not be empty")]
    EmptyQuery,

    /// Empty model name passed to model selection.
    #[error("model name must not be empty")]
    EmptyModel,

    /// Model name rejected by the selection policy.
    #[error("model not found in catalog: {0}")]
    ModelNotFound(String),

    /// Model admitted locally but rejected by the live service.
    #[error("model '{model}' rejected by the service: {reason}")]
    ModelRejected { model: String, reason: String },

    /// Provider returned a response with no choices.
    #[error("response contained no choices")]
    EmptyResponse,

    /// No API key in the keyring or the environment.
    #[error("credentials not found for {0}")]
    CredentialsNotFound(String),

    /// Failed to access the system keyring.
    #[error("keyring error: {0}")]
    Keyring(String),

    /// Provider returned a non-success HTTP status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Request failed at the transport level.
    #[error("request failed: {0}")]
    Request(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats_correctly() {
        let err = Error::ModelNotFound("bogus-llm-1b".to_string());
        assert_eq!(err.to_string(), "model not found in catalog: bogus-llm-1b");
    }

    #[test]
    fn api_error_includes_status_and_body() {
        let err = Error::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 401): unauthorized");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err: serde_json::Error = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
