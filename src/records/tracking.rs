//! Warmup tracking CNAME generation.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_TRACKING_SUBDOMAIN;
use crate::error_handling::{AuthError, Issue};

use super::types::{is_valid_label, normalize_domain_name, DnsRecordSpec, RecordSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingOptions {
    pub domain: String,
    /// Defaults to `emailtracking`.
    pub subdomain: Option<String>,
    /// Host the warmup vendor serves tracking links from.
    pub target: String,
}

impl TrackingOptions {
    pub fn new(domain: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subdomain: None,
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub record_name: String,
    pub target: String,
    /// Always false: mail-adjacent records must resolve directly.
    pub proxied: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl RecordSet for TrackingRecord {
    fn dns_records(&self) -> Vec<DnsRecordSpec> {
        vec![DnsRecordSpec::cname(
            self.record_name.clone(),
            self.target.clone(),
        )]
    }

    fn errors(&self) -> &[Issue] {
        &self.errors
    }

    fn warnings(&self) -> &[Issue] {
        &self.warnings
    }
}

/// Builds the `{sub}.{domain}` tracking CNAME.
pub fn generate_tracking(options: &TrackingOptions) -> Result<TrackingRecord, AuthError> {
    let domain = normalize_domain_name(&options.domain)?;
    let subdomain = options
        .subdomain
        .as_deref()
        .unwrap_or(DEFAULT_TRACKING_SUBDOMAIN)
        .trim()
        .to_ascii_lowercase();
    if !is_valid_label(&subdomain) {
        return Err(AuthError::Validation(format!(
            "invalid tracking subdomain: {subdomain:?}"
        )));
    }
    let target = normalize_domain_name(&options.target)
        .map_err(|_| AuthError::Validation(format!("invalid tracking target: {:?}", options.target)))?;

    Ok(TrackingRecord {
        record_name: format!("{subdomain}.{domain}"),
        target,
        proxied: false,
        errors: Vec::new(),
        warnings: Vec::new(),
    })
}
