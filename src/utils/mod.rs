//! Ambient utilities: logging setup, shutdown signal handling, time, and
//! reconnect backoff.

pub mod logging;
pub mod retry;
pub mod signal;
pub mod time;

pub use logging::init_logging;
pub use retry::{retry_async_with_backoff, RetryConfig};
pub use signal::TerminateFlag;
pub use time::current_timestamp;
