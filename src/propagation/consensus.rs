//! Multi-resolver consensus and completion estimates.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ResolverEndpoint;
use crate::dns::RecordKind;
use crate::error_handling::{DnsErrorKind, QueryOutcome};
use crate::records::ExpectedRecord;

/// One resolver of the propagation panel and the client that reaches it.
#[derive(Debug, Clone)]
pub struct PanelResolver<C> {
    pub endpoint: ResolverEndpoint,
    pub client: C,
}

impl<C> PanelResolver<C> {
    pub fn new(endpoint: ResolverEndpoint, client: C) -> Self {
        Self { endpoint, client }
    }
}

/// Answer of a single resolver for a single expected record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServerQueryResult {
    pub resolver: String,
    pub address: IpAddr,
    pub record_type: RecordKind,
    pub name: String,
    /// Normalized answer values; empty on error.
    pub values: Vec<String>,
    pub matched: bool,
    pub error: Option<DnsErrorKind>,
    pub response_time_ms: u64,
}

impl DnsServerQueryResult {
    pub fn outcome(&self) -> QueryOutcome {
        match (self.error, self.matched) {
            (Some(kind), _) => QueryOutcome::from(kind),
            (None, true) => QueryOutcome::Matched,
            (None, false) => QueryOutcome::Mismatched,
        }
    }
}

/// Consensus for one expected record across the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiServerQueryResult {
    pub record: ExpectedRecord,
    pub results: Vec<DnsServerQueryResult>,
    pub propagated_servers: usize,
    pub total_servers: usize,
    pub propagation_percentage: u8,
    /// Every resolver returned the expected value.
    pub is_propagated: bool,
}

impl MultiServerQueryResult {
    pub fn from_results(record: ExpectedRecord, results: Vec<DnsServerQueryResult>) -> Self {
        let total_servers = results.len();
        let propagated_servers = results.iter().filter(|r| r.matched).count();
        let propagation_percentage = percentage(propagated_servers, total_servers);
        Self {
            record,
            results,
            propagated_servers,
            total_servers,
            propagation_percentage,
            is_propagated: propagation_percentage == 100,
        }
    }
}

/// `part / total` as a whole percentage, rounded down. Zero when `total` is zero.
pub fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = part.min(total) * 100 / total;
    u8::try_from(pct).unwrap_or(100)
}

/// Extrapolates the completion time from progress made so far.
///
/// Returns `None` without any progress: there is nothing to extrapolate from.
pub fn estimate_completion(
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    overall_progress: u8,
) -> Option<DateTime<Utc>> {
    if overall_progress == 0 {
        return None;
    }
    let elapsed_ms = (now - started_at).num_milliseconds().max(0);
    let estimated_total_ms = elapsed_ms.checked_mul(100)? / i64::from(overall_progress.min(100));
    let remaining_ms = estimated_total_ms - elapsed_ms;
    now.checked_add_signed(chrono::Duration::milliseconds(remaining_ms))
}
