//! Retry module: backoff policy and the cancellable retry loop.

mod policy;
mod throttle;

pub use policy::{DEFAULT_INITIAL_INTERVAL, DEFAULT_MAXIMUM_INTERVAL, RetryPolicy};
pub use throttle::ThrottleRetry;
