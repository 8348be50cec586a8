//! DNS query client and record querying.
//!
//! This module provides async DNS operations behind the `DnsQuery` trait:
//! - Nameserver queries (NS records)
//! - Text record queries (TXT records) with SPF/DMARC extraction
//! - Mail exchanger queries (MX records)
//! - Alias and address queries (CNAME, A, AAAA)
//!
//! Failures are classified as NXDOMAIN, NODATA, SERVFAIL or TIMEOUT. The
//! hickory-backed client can be pinned to a single public resolver, which is
//! how the propagation poller builds its panel.

mod client;
mod extract;
pub mod mock;
mod records;
mod types;

// Re-export public API
pub use client::{DnsQuery, HickoryDnsClient};
pub use extract::{extract_dmarc_record, extract_spf_records, is_spf_record};
pub use mock::MockDnsClient;
pub use records::{normalize_value, query_record_values};
pub use types::{MxRecord, RecordKind};
