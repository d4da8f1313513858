//! Optional second opinion from a local language model.
//!
//! The deterministic engine stays authoritative: suggestions can only add
//! possible allergens, and any failure leaves the assessment untouched.

pub mod augment;
pub mod ollama;
pub mod parser;
pub mod prompt;
pub mod types;

use thiserror::Error;

pub use augment::AdvisoryAugmenter;
pub use ollama::{MockLlmClient, OllamaClient};
pub use types::LlmClient;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryError {
    #[error("Model server is not reachable at {0}")]
    Connection(String),

    #[error("Model server returned error (status {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}

impl AdvisoryError {
    /// Transport failures and server-side errors are worth another attempt;
    /// a response that does not parse will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::HttpClient(_) => true,
            Self::ServerError { status, .. } => *status >= 500 || *status == 429,
            Self::MalformedResponse(_) | Self::JsonParsing(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(AdvisoryError::Timeout(20).is_retryable());
        assert!(AdvisoryError::Connection("http://localhost:11434".into()).is_retryable());
        assert!(AdvisoryError::ServerError { status: 503, body: String::new() }.is_retryable());
        assert!(AdvisoryError::ServerError { status: 429, body: String::new() }.is_retryable());
        assert!(!AdvisoryError::ServerError { status: 404, body: String::new() }.is_retryable());
        assert!(!AdvisoryError::JsonParsing("eof".into()).is_retryable());
    }
}
