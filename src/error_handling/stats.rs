//! Query outcome statistics.
//!
//! This module provides thread-safe counters for the outcomes of the resolver
//! queries issued during one propagation check.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;

use super::types::DnsErrorKind;

/// Outcome of a single resolver query against an expected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    /// The resolver returned the expected value
    Matched,
    /// The resolver answered, but not with the expected value
    Mismatched,
    NotFound,
    NoData,
    ServerFail,
    Timeout,
}

impl QueryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOutcome::Matched => "matched",
            QueryOutcome::Mismatched => "mismatched",
            QueryOutcome::NotFound => "nxdomain",
            QueryOutcome::NoData => "nodata",
            QueryOutcome::ServerFail => "servfail",
            QueryOutcome::Timeout => "timeout",
        }
    }
}

impl From<DnsErrorKind> for QueryOutcome {
    fn from(kind: DnsErrorKind) -> Self {
        match kind {
            DnsErrorKind::NotFound => QueryOutcome::NotFound,
            DnsErrorKind::NoData => QueryOutcome::NoData,
            DnsErrorKind::ServerFail => QueryOutcome::ServerFail,
            DnsErrorKind::Timeout => QueryOutcome::Timeout,
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe query outcome tracker.
///
/// All outcomes are initialized to zero on creation, so concurrent tasks only
/// ever touch existing atomic counters.
pub struct QueryStats {
    outcomes: HashMap<QueryOutcome, AtomicUsize>,
}

impl QueryStats {
    pub fn new() -> Self {
        let mut outcomes = HashMap::new();
        for outcome in QueryOutcome::iter() {
            outcomes.insert(outcome, AtomicUsize::new(0));
        }
        QueryStats { outcomes }
    }

    pub fn record(&self, outcome: QueryOutcome) {
        if let Some(counter) = self.outcomes.get(&outcome) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to record outcome {:?} which is not in the map. \
                 This indicates a bug in QueryStats initialization.",
                outcome
            );
        }
    }

    pub fn count(&self, outcome: QueryOutcome) -> usize {
        self.outcomes
            .get(&outcome)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.outcomes.values().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Non-zero counts in declaration order.
    pub fn snapshot(&self) -> Vec<(QueryOutcome, usize)> {
        QueryOutcome::iter()
            .map(|outcome| (outcome, self.count(outcome)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

impl Default for QueryStats {
    fn default() -> Self {
        Self::new()
    }
}
