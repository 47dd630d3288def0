//! Error and retry helpers shared by every backend.

pub mod error;
pub mod retry;

pub use error::{DatabaseError, DatabaseResult};
pub use retry::{RetryConfig, RetryDecision, retry, retry_with_backoff, retry_with_policy};
