//! Error categorization and retry strategy.
//!
//! This module maps hickory resolver failures onto the engine's DNS error
//! classes and configures the backoff used when callers retry.

use std::time::Duration;

use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::error::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::{AuthError, DnsErrorKind};

/// Creates an exponential backoff retry strategy.
///
/// Returns a retry strategy configured with:
/// - Initial delay: `RETRY_INITIAL_DELAY_MS` milliseconds
/// - Backoff factor: `RETRY_FACTOR` (doubles delay each retry)
/// - Maximum delay: `RETRY_MAX_DELAY_SECS` seconds
/// - Maximum retries: `RETRY_MAX_ATTEMPTS`
///
/// # Returns
///
/// A retry strategy iterator ready for use with `tokio_retry::Retry`.
pub fn get_retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(crate::config::RETRY_INITIAL_DELAY_MS)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .take(crate::config::RETRY_MAX_ATTEMPTS)
}

/// Categorizes a hickory `ResolveError` into a `DnsErrorKind`.
///
/// Negative answers carry the response code, which separates NXDOMAIN from
/// NODATA. Everything that is neither an answer nor a timeout is treated as a
/// server failure, since it is the resolver (not the zone) that misbehaved.
pub fn classify_resolve_error(error: &ResolveError) -> DnsErrorKind {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => DnsErrorKind::NotFound,
            ResponseCode::ServFail | ResponseCode::Refused => DnsErrorKind::ServerFail,
            _ => DnsErrorKind::NoData,
        },
        ResolveErrorKind::Timeout => DnsErrorKind::Timeout,
        ResolveErrorKind::Proto(proto) => match proto.kind() {
            ProtoErrorKind::Timeout => DnsErrorKind::Timeout,
            _ => classify_error_message(&proto.to_string()),
        },
        _ => classify_error_message(&error.to_string()),
    }
}

/// Fallback classification from an error message.
///
/// Used for error variants that carry no structured response code.
pub(crate) fn classify_error_message(message: &str) -> DnsErrorKind {
    let msg = message.to_lowercase();
    if msg.contains("nxdomain") {
        DnsErrorKind::NotFound
    } else if msg.contains("no records found") {
        DnsErrorKind::NoData
    } else if msg.contains("timed out") || msg.contains("timeout") {
        DnsErrorKind::Timeout
    } else {
        DnsErrorKind::ServerFail
    }
}

/// Determines if a hard failure is worth retrying by the caller.
///
/// Only transient resolver conditions (SERVFAIL, timeouts) and registrar
/// errors flagged as retryable qualify.
pub fn is_retryable_error(error: &AuthError) -> bool {
    match error {
        AuthError::Dns(e) => e.is_retryable(),
        AuthError::Registrar(e) => e.retryable,
        AuthError::Validation(_) | AuthError::NoSpfRecord(_) | AuthError::Session(_) => false,
    }
}
