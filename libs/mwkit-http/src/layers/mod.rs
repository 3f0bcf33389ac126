//! Tower layers composing the client middleware stack.
//!
//! - [`RetryLayer`] - retry with exponential backoff and jitter
//! - [`AttemptTimeoutLayer`] - per-attempt timeout, overridable per request
//! - [`SessionLayer`] - `User-Agent` and cookie jar handling

mod retry;
mod session;
mod timeout;

pub use retry::{RetryLayer, RetryService, calculate_backoff};
pub use session::{SessionLayer, SessionService};
pub use timeout::{AttemptTimeout, AttemptTimeoutLayer, AttemptTimeoutService};
