//! In-memory `DnsQuery` implementation.
//!
//! Answers come from a table filled in by the caller; every query is logged so
//! tests can assert how many lookups an operation performed.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error_handling::{DnsErrorKind, DnsQueryError};

use super::client::DnsQuery;
use super::types::{MxRecord, RecordKind};

#[derive(Debug, Clone)]
enum MockAnswer {
    Records(Vec<String>),
    Error(DnsErrorKind),
}

#[derive(Default)]
struct MockState {
    answers: HashMap<(RecordKind, String), MockAnswer>,
    queries: Vec<(RecordKind, String)>,
    delay: Option<Duration>,
}

/// Mock DNS client for tests and dry runs.
///
/// A name with no entry at all answers NXDOMAIN; a name with entries of other
/// types answers NODATA.
#[derive(Clone, Default)]
pub struct MockDnsClient {
    state: Arc<Mutex<MockState>>,
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

impl MockDnsClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the answer set for `(kind, name)`.
    pub fn set_records(&self, kind: RecordKind, name: &str, values: Vec<String>) {
        self.state()
            .answers
            .insert((kind, normalize_name(name)), MockAnswer::Records(values));
    }

    pub fn add_txt(&self, name: &str, value: &str) {
        self.push(RecordKind::Txt, name, value.to_string());
    }

    pub fn add_a(&self, name: &str, addr: Ipv4Addr) {
        self.push(RecordKind::A, name, addr.to_string());
    }

    pub fn add_aaaa(&self, name: &str, addr: Ipv6Addr) {
        self.push(RecordKind::Aaaa, name, addr.to_string());
    }

    pub fn add_mx(&self, name: &str, priority: u16, exchange: &str) {
        self.push(RecordKind::Mx, name, format!("{priority} {exchange}"));
    }

    pub fn add_cname(&self, name: &str, target: &str) {
        self.push(RecordKind::Cname, name, target.to_string());
    }

    pub fn add_ns(&self, name: &str, nameserver: &str) {
        self.push(RecordKind::Ns, name, nameserver.to_string());
    }

    /// Makes every `(kind, name)` query fail with `error`.
    pub fn set_error(&self, kind: RecordKind, name: &str, error: DnsErrorKind) {
        self.state()
            .answers
            .insert((kind, normalize_name(name)), MockAnswer::Error(error));
    }

    /// Delays every answer, to exercise caller-side timeouts.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// All queries issued so far, in order.
    pub fn queries(&self) -> Vec<(RecordKind, String)> {
        self.state().queries.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state().queries.len()
    }

    fn push(&self, kind: RecordKind, name: &str, value: String) {
        let mut state = self.state();
        let entry = state
            .answers
            .entry((kind, normalize_name(name)))
            .or_insert_with(|| MockAnswer::Records(Vec::new()));
        match entry {
            MockAnswer::Records(values) => values.push(value),
            MockAnswer::Error(_) => *entry = MockAnswer::Records(vec![value]),
        }
    }

    async fn answer(&self, kind: RecordKind, domain: &str) -> Result<Vec<String>, DnsQueryError> {
        let name = normalize_name(domain);
        let (answer, delay, name_exists) = {
            let mut state = self.state();
            state.queries.push((kind, name.clone()));
            let answer = state.answers.get(&(kind, name.clone())).cloned();
            let name_exists = state.answers.keys().any(|(_, n)| *n == name);
            (answer, state.delay, name_exists)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match answer {
            Some(MockAnswer::Records(values)) if !values.is_empty() => Ok(values),
            Some(MockAnswer::Error(error)) => Err(DnsQueryError::new(error, domain, kind)),
            _ if name_exists => Err(DnsQueryError::new(DnsErrorKind::NoData, domain, kind)),
            _ => Err(DnsQueryError::new(DnsErrorKind::NotFound, domain, kind)),
        }
    }
}

impl DnsQuery for MockDnsClient {
    async fn query_nameservers(&self, domain: &str) -> Result<Vec<String>, DnsQueryError> {
        self.answer(RecordKind::Ns, domain).await
    }

    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsQueryError> {
        self.answer(RecordKind::Txt, domain).await
    }

    async fn query_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsQueryError> {
        let values = self.answer(RecordKind::Mx, domain).await?;
        let mut records: Vec<MxRecord> = values.iter().filter_map(|v| v.parse().ok()).collect();
        records.sort_by_key(|mx| mx.priority);
        Ok(records)
    }

    async fn query_cname(&self, domain: &str) -> Result<Vec<String>, DnsQueryError> {
        self.answer(RecordKind::Cname, domain).await
    }

    async fn query_a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DnsQueryError> {
        let values = self.answer(RecordKind::A, domain).await?;
        Ok(values.iter().filter_map(|v| v.parse().ok()).collect())
    }

    async fn query_aaaa(&self, domain: &str) -> Result<Vec<Ipv6Addr>, DnsQueryError> {
        let values = self.answer(RecordKind::Aaaa, domain).await?;
        Ok(values.iter().filter_map(|v| v.parse().ok()).collect())
    }
}
