//! Apex TXT records: provider SPF base record and domain verification token.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::config::{GOOGLE_SPF_INCLUDE, SPF_DEFAULT_ALL, SPF_MAX_LOOKUPS};
use crate::error_handling::{AuthError, ErrorKind, Issue};
use crate::spf::{count_spf_lookups, validate_network, MechanismKind};

use super::types::{normalize_domain_name, DnsRecordSpec, Provider, RecordSet};

const GOOGLE_VERIFICATION_PREFIX: &str = "google-site-verification=";

/// A single apex TXT record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxtRecord {
    pub record_name: String,
    pub record_value: String,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl RecordSet for TxtRecord {
    fn dns_records(&self) -> Vec<DnsRecordSpec> {
        vec![DnsRecordSpec::txt(
            self.record_name.clone(),
            self.record_value.clone(),
        )]
    }

    fn errors(&self) -> &[Issue] {
        &self.errors
    }

    fn warnings(&self) -> &[Issue] {
        &self.warnings
    }
}

/// Builds the site-verification TXT record from the provider's token.
///
/// A token that already carries the `google-site-verification=` prefix is used as-is.
pub fn generate_verification(domain: &str, token: &str) -> Result<TxtRecord, AuthError> {
    let record_name = normalize_domain_name(domain)?;
    let token = token.trim();
    let token = token.strip_prefix(GOOGLE_VERIFICATION_PREFIX).unwrap_or(token);
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::Validation(
            "verification token is missing or malformed".to_string(),
        ));
    }

    Ok(TxtRecord {
        record_name,
        record_value: format!("{GOOGLE_VERIFICATION_PREFIX}{token}"),
        errors: Vec::new(),
        warnings: Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpfOptions {
    pub domain: String,
    pub provider: Provider,
    /// Extra `include:` domains (other senders).
    pub additional_includes: Vec<String>,
    /// Literal `ip4`/`ip6` networks, e.g. `192.0.2.0/24`.
    pub ip_addresses: Vec<String>,
}

impl SpfOptions {
    pub fn new(domain: impl Into<String>, provider: Provider) -> Self {
        Self {
            domain: domain.into(),
            provider,
            additional_includes: Vec::new(),
            ip_addresses: Vec::new(),
        }
    }
}

/// Builds a fresh SPF record authorizing the provider plus any extra senders.
pub fn generate_spf(options: &SpfOptions) -> Result<TxtRecord, AuthError> {
    let record_name = normalize_domain_name(&options.domain)?;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut terms = vec!["v=spf1".to_string()];
    for network in &options.ip_addresses {
        let network = network.trim();
        let address = network.split('/').next().unwrap_or(network);
        let (kind, tag) = match address.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => (MechanismKind::Ip4, "ip4"),
            Ok(IpAddr::V6(_)) => (MechanismKind::Ip6, "ip6"),
            Err(_) => {
                errors.push(Issue::new(
                    ErrorKind::Validation,
                    format!("{network:?} is not an IP address or network; omitted"),
                ));
                continue;
            }
        };
        match validate_network(kind, network) {
            Ok(()) => terms.push(format!("{tag}:{network}")),
            Err(e) => errors.push(Issue::new(ErrorKind::Validation, format!("{e}; omitted"))),
        }
    }

    let mut includes: Vec<String> = Vec::new();
    if options.provider == Provider::GoogleWorkspace {
        includes.push(GOOGLE_SPF_INCLUDE.to_string());
    }
    for include in &options.additional_includes {
        if include.trim().is_empty() {
            continue;
        }
        match normalize_domain_name(include) {
            Ok(include) if !includes.contains(&include) => includes.push(include),
            Ok(_) => {}
            Err(_) => errors.push(Issue::new(
                ErrorKind::Validation,
                format!("include {:?} is not a domain name; omitted", include.trim()),
            )),
        }
    }
    terms.extend(includes.iter().map(|d| format!("include:{d}")));

    if terms.len() == 1 {
        errors.push(Issue::new(
            ErrorKind::Validation,
            "SPF record authorizes no senders".to_string(),
        ));
    }
    terms.push(SPF_DEFAULT_ALL.to_string());
    let record_value = terms.join(" ");

    let lookups = count_spf_lookups(&record_value).map_err(|e| AuthError::Validation(e.to_string()))?;
    if lookups > SPF_MAX_LOOKUPS {
        errors.push(Issue::new(
            ErrorKind::LookupBudgetExceeded,
            format!("record needs {lookups} lookups; flatten it to stay under {SPF_MAX_LOOKUPS}"),
        ));
    } else if lookups > SPF_MAX_LOOKUPS / 2 {
        warnings.push(Issue::new(
            ErrorKind::LookupBudgetExceeded,
            format!("record already uses {lookups} of {SPF_MAX_LOOKUPS} lookups before nested includes"),
        ));
    }

    Ok(TxtRecord {
        record_name,
        record_value,
        errors,
        warnings,
    })
}
