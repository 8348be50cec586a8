//! Registrar/DNS-zone API boundary.

use std::future::Future;

use crate::error_handling::RegistrarError;
use crate::records::DnsRecordSpec;

/// Something that can publish a record into a DNS zone (Cloudflare and the like).
///
/// Implementations set `RegistrarError::retryable` for rate limits and server
/// errors; those submissions are retried with backoff.
pub trait DnsRecordSink: Send + Sync {
    /// Creates `record` in `zone_id` and returns the registrar's record id.
    fn create_dns_record(
        &self,
        zone_id: &str,
        record: &DnsRecordSpec,
    ) -> impl Future<Output = Result<String, RegistrarError>> + Send;
}
