//! DNS query client.
//!
//! `DnsQuery` abstracts the six lookups the engine needs so that the SPF
//! flattener and the propagation poller can run against a real resolver or an
//! in-memory one. Calls are plain network I/O: no retry and no caching.

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use log::debug;

use crate::config::ResolverEndpoint;
use crate::error_handling::{classify_resolve_error, DnsErrorKind, DnsQueryError};
use crate::initialization::{init_endpoint_resolver, init_resolver};

use super::types::{MxRecord, RecordKind};

/// Typed DNS lookups with classified errors.
///
/// An empty answer is never returned as success: a name without records of the
/// requested type yields [`DnsErrorKind::NoData`].
pub trait DnsQuery: Send + Sync {
    fn query_nameservers(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<String>, DnsQueryError>> + Send;

    fn query_txt(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<String>, DnsQueryError>> + Send;

    fn query_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, DnsQueryError>> + Send;

    fn query_cname(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<String>, DnsQueryError>> + Send;

    fn query_a(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<Ipv4Addr>, DnsQueryError>> + Send;

    fn query_aaaa(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<Ipv6Addr>, DnsQueryError>> + Send;
}

/// `DnsQuery` backed by a hickory `TokioAsyncResolver`.
#[derive(Clone)]
pub struct HickoryDnsClient {
    resolver: Arc<TokioAsyncResolver>,
    label: String,
}

impl HickoryDnsClient {
    /// Wraps an existing resolver.
    pub fn new(resolver: Arc<TokioAsyncResolver>, label: impl Into<String>) -> Self {
        Self {
            resolver,
            label: label.into(),
        }
    }

    /// Client using the default upstream configuration.
    pub fn system(timeout: Duration) -> Self {
        Self::new(init_resolver(timeout), "default")
    }

    /// Client that only ever asks `endpoint`.
    pub fn for_endpoint(endpoint: &ResolverEndpoint, timeout: Duration) -> Self {
        Self::new(
            init_endpoint_resolver(endpoint.address, timeout),
            endpoint.name.clone(),
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Issues one lookup and keeps the answers of the requested type.
    async fn lookup_rdata(
        &self,
        domain: &str,
        kind: RecordKind,
    ) -> Result<Vec<RData>, DnsQueryError> {
        let record_type = match kind {
            RecordKind::Ns => RecordType::NS,
            RecordKind::Txt => RecordType::TXT,
            RecordKind::Mx => RecordType::MX,
            RecordKind::Cname => RecordType::CNAME,
            RecordKind::A => RecordType::A,
            RecordKind::Aaaa => RecordType::AAAA,
        };
        debug!("[{}] {} lookup for {}", self.label, kind, domain);

        // For TXT/NS/MX lookups, use domain as-is (no trailing dot needed)
        match self.resolver.lookup(domain, record_type).await {
            Ok(lookup) => {
                let rdata: Vec<RData> = lookup
                    .iter()
                    .filter(|rdata| rdata.record_type() == record_type)
                    .cloned()
                    .collect();
                if rdata.is_empty() {
                    // Only a CNAME (or other types) came back for this name
                    Err(DnsQueryError::new(DnsErrorKind::NoData, domain, kind))
                } else {
                    Ok(rdata)
                }
            }
            Err(e) => {
                let error_kind = classify_resolve_error(&e);
                match error_kind {
                    DnsErrorKind::Timeout => {
                        log::warn!("[{}] {kind} lookup timed out for {domain}: {e}", self.label)
                    }
                    DnsErrorKind::ServerFail => {
                        log::warn!("[{}] {kind} lookup failed for {domain}: {e}", self.label)
                    }
                    DnsErrorKind::NotFound | DnsErrorKind::NoData => {
                        debug!("[{}] {kind} lookup for {domain}: {error_kind}", self.label)
                    }
                }
                Err(DnsQueryError::new(error_kind, domain, kind))
            }
        }
    }
}

fn trim_fqdn(name: String) -> String {
    name.trim_end_matches('.').to_string()
}

impl DnsQuery for HickoryDnsClient {
    async fn query_nameservers(&self, domain: &str) -> Result<Vec<String>, DnsQueryError> {
        let rdata = self.lookup_rdata(domain, RecordKind::Ns).await?;
        Ok(rdata
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::NS(ns) => Some(trim_fqdn(ns.to_utf8())),
                _ => None,
            })
            .collect())
    }

    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsQueryError> {
        let rdata = self.lookup_rdata(domain, RecordKind::Txt).await?;
        Ok(rdata
            .into_iter()
            .filter_map(|rdata| match rdata {
                // TXT records can contain multiple strings - join them
                RData::TXT(txt) => Some(
                    txt.iter()
                        .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                        .collect::<Vec<String>>()
                        .join(""),
                ),
                _ => None,
            })
            .collect())
    }

    async fn query_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsQueryError> {
        let rdata = self.lookup_rdata(domain, RecordKind::Mx).await?;
        let mut records: Vec<MxRecord> = rdata
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::MX(mx) => Some(MxRecord::new(
                    mx.preference(),
                    trim_fqdn(mx.exchange().to_utf8()),
                )),
                _ => None,
            })
            .collect();
        // Lower preference = higher priority
        records.sort_by_key(|mx| mx.priority);
        Ok(records)
    }

    async fn query_cname(&self, domain: &str) -> Result<Vec<String>, DnsQueryError> {
        let rdata = self.lookup_rdata(domain, RecordKind::Cname).await?;
        Ok(rdata
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::CNAME(cname) => Some(trim_fqdn(cname.to_utf8())),
                _ => None,
            })
            .collect())
    }

    async fn query_a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DnsQueryError> {
        let rdata = self.lookup_rdata(domain, RecordKind::A).await?;
        Ok(rdata
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::A(a) => Some(a.0),
                _ => None,
            })
            .collect())
    }

    async fn query_aaaa(&self, domain: &str) -> Result<Vec<Ipv6Addr>, DnsQueryError> {
        let rdata = self.lookup_rdata(domain, RecordKind::Aaaa).await?;
        Ok(rdata
            .into_iter()
            .filter_map(|rdata| match rdata {
                RData::AAAA(aaaa) => Some(aaaa.0),
                _ => None,
            })
            .collect())
    }
}
