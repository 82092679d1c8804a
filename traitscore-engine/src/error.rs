//! Error types for the scoring engine
//!
//! Remote completion failures are kept apart from storage failures: the
//! former feed the retry policy, the latter are common `traitscore_common::Error`s.

use thiserror::Error;

/// Remote completion call error
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Endpoint answered with a non-success status
    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },

    /// Request never produced a response (connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body was not the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response carried no completion text
    #[error("Empty completion response")]
    EmptyResponse,

    /// The worker's concurrency gate was shut
    #[error("Concurrency gate closed")]
    GateClosed,
}

impl ScoringError {
    /// Whether this failure is the endpoint throttling us
    ///
    /// A typed 429 is authoritative. Otherwise the error text is checked for
    /// "429" or "rate" (case-insensitive), since providers also report
    /// throttling inside other statuses and bodies.
    pub fn is_rate_limit(&self) -> bool {
        if let ScoringError::Http { status: 429, .. } = self {
            return true;
        }
        let text = self.to_string();
        text.contains("429") || text.to_lowercase().contains("rate")
    }
}
