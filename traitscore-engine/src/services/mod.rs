//! Services used by scoring workers

pub mod completion_client;
pub mod concurrency_gate;
pub mod rate_limiter;
pub mod retry_policy;

pub use completion_client::{
    build_prompt, interpret_answer, ClientSettings, CompletionClient, OpenAiClient,
};
pub use concurrency_gate::ConcurrencyGate;
pub use rate_limiter::RateLimiter;
pub use retry_policy::{RetryExhausted, RetryPolicy};
