pub mod retry;

pub use retry::{retry_bounded, RetryPolicy, RetryResult, Retryable};
