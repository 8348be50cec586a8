//! Error handling and query statistics.
//!
//! This module provides:
//! - The engine error taxonomy (`ErrorKind`) and `Issue` entries for best-effort results
//! - Hard-failure error types (`AuthError` and friends)
//! - Classification of resolver errors and the caller-side retry strategy
//! - Per-outcome query statistics for propagation checks

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{classify_resolve_error, get_retry_strategy, is_retryable_error};
pub use stats::{QueryOutcome, QueryStats};
pub use types::{
    AuthError, DnsErrorKind, DnsQueryError, ErrorKind, InitializationError, Issue,
    RegistrarError, SessionError,
};
