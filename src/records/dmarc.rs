//! DMARC policy record generation.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::DNS_TXT_STRING_MAX;
use crate::error_handling::{AuthError, ErrorKind, Issue};

use super::types::{normalize_domain_name, DnsRecordSpec, RecordSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DmarcPolicy {
    None,
    Quarantine,
    Reject,
}

impl DmarcPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmarcPolicy::None => "none",
            DmarcPolicy::Quarantine => "quarantine",
            DmarcPolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for DmarcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DmarcPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DmarcPolicy::None),
            "quarantine" => Ok(DmarcPolicy::Quarantine),
            "reject" => Ok(DmarcPolicy::Reject),
            other => Err(format!("unknown DMARC policy: {other}")),
        }
    }
}

/// Identifier alignment mode (`adkim` / `aspf`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Relaxed,
    Strict,
}

impl Alignment {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Alignment::Relaxed => "r",
            Alignment::Strict => "s",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmarcOptions {
    pub domain: String,
    pub policy: DmarcPolicy,
    pub subdomain_policy: Option<DmarcPolicy>,
    /// Share of failing mail the policy applies to, 0..=100.
    pub percentage: u32,
    pub adkim: Alignment,
    pub aspf: Alignment,
    /// Aggregate report addresses (`mailto:` added when missing).
    pub rua: Vec<String>,
    /// Forensic report addresses.
    pub ruf: Vec<String>,
    /// `fo=` failure reporting options, e.g. `1` or `d:s`.
    pub failure_options: Option<String>,
    /// `ri=` aggregate report interval in seconds.
    pub report_interval: Option<u32>,
    /// Policy currently published, for the progression check.
    pub existing_policy: Option<DmarcPolicy>,
    /// Allows replacing `p=reject` with `p=none`.
    pub allow_policy_downgrade: bool,
}

impl DmarcOptions {
    pub fn new(domain: impl Into<String>, policy: DmarcPolicy) -> Self {
        Self {
            domain: domain.into(),
            policy,
            subdomain_policy: None,
            percentage: 100,
            adkim: Alignment::Relaxed,
            aspf: Alignment::Relaxed,
            rua: Vec::new(),
            ruf: Vec::new(),
            failure_options: None,
            report_interval: None,
            existing_policy: None,
            allow_policy_downgrade: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmarcRecord {
    pub record_name: String,
    pub record_value: String,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl RecordSet for DmarcRecord {
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

/// Normalizes report addresses into `mailto:` URIs, reporting the ones that are not.
fn report_uris(tag: &str, addresses: &[String], errors: &mut Vec<Issue>) -> Vec<String> {
    let mut uris: Vec<String> = Vec::new();
    for address in addresses {
        let address = address.trim();
        let mailbox = address.strip_prefix("mailto:").unwrap_or(address);
        let valid = match mailbox.split_once('@') {
            Some((local, host)) => !local.is_empty() && host.contains('.') && !mailbox.contains([',', ';', ' ']),
            None => false,
        };
        if !valid {
            errors.push(Issue::new(
                ErrorKind::Validation,
                format!("{tag} address {address:?} is not a valid mailbox; omitted"),
            ));
            continue;
        }
        let uri = format!("mailto:{mailbox}");
        if !uris.contains(&uri) {
            uris.push(uri);
        }
    }
    uris
}

/// Reads the `p=` tag of a published DMARC record.
///
/// Returns `None` when the record carries no recognizable policy.
pub fn parse_dmarc_policy(record: &str) -> Option<DmarcPolicy> {
    record
        .split(';')
        .filter_map(|tag| tag.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("p"))
        .and_then(|(_, value)| value.parse().ok())
}

fn valid_failure_options(fo: &str) -> bool {
    !fo.is_empty() && fo.split(':').all(|opt| matches!(opt, "0" | "1" | "d" | "s"))
}

/// Builds the `_dmarc.{domain}` TXT record.
///
/// Tags are emitted in the order `v p sp pct rua ruf fo adkim aspf ri`.
///
/// # Errors
///
/// Invalid domain, `percentage` above 100, or a `reject` → `none` transition
/// without `allow_policy_downgrade`.
pub fn generate_dmarc(options: &DmarcOptions) -> Result<DmarcRecord, AuthError> {
    let domain = normalize_domain_name(&options.domain)?;
    if options.percentage > 100 {
        return Err(AuthError::Validation(format!(
            "DMARC percentage must be between 0 and 100, got {}",
            options.percentage
        )));
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Some(existing) = options.existing_policy {
        if existing > options.policy {
            let transition = format!("{existing} -> {}", options.policy);
            if existing == DmarcPolicy::Reject
                && options.policy == DmarcPolicy::None
                && !options.allow_policy_downgrade
            {
                return Err(AuthError::Validation(format!(
                    "refusing DMARC policy downgrade {transition} without an explicit override"
                )));
            }
            warn!("DMARC policy downgrade for {}: {}", domain, transition);
            warnings.push(Issue::new(
                ErrorKind::Validation,
                format!("DMARC policy is being downgraded ({transition})"),
            ));
        }
    }

    if options.policy == DmarcPolicy::None {
        warnings.push(Issue::new(
            ErrorKind::Validation,
            "p=none only monitors; failing mail is still delivered".to_string(),
        ));
    }

    let rua = report_uris("rua", &options.rua, &mut errors);
    let ruf = report_uris("ruf", &options.ruf, &mut errors);
    if rua.is_empty() {
        warnings.push(Issue::new(
            ErrorKind::Validation,
            "no aggregate report address (rua); DMARC results will not be visible".to_string(),
        ));
    }

    let mut tags = vec![
        "v=DMARC1".to_string(),
        format!("p={}", options.policy),
    ];
    if let Some(sp) = options.subdomain_policy {
        tags.push(format!("sp={sp}"));
    }
    tags.push(format!("pct={}", options.percentage));
    if !rua.is_empty() {
        tags.push(format!("rua={}", rua.join(",")));
    }
    if !ruf.is_empty() {
        tags.push(format!("ruf={}", ruf.join(",")));
    }
    if let Some(fo) = &options.failure_options {
        let fo = fo.trim();
        if valid_failure_options(fo) {
            tags.push(format!("fo={fo}"));
        } else {
            errors.push(Issue::new(
                ErrorKind::Validation,
                format!("invalid DMARC failure options {fo:?}; omitted"),
            ));
        }
    }
    tags.push(format!("adkim={}", options.adkim.as_tag()));
    tags.push(format!("aspf={}", options.aspf.as_tag()));
    if let Some(ri) = options.report_interval {
        tags.push(format!("ri={ri}"));
    }

    let record_value = tags.join("; ");
    if record_value.len() > DNS_TXT_STRING_MAX {
        warnings.push(Issue::new(
            ErrorKind::CharacterLimitExceeded,
            format!(
                "DMARC value is {} characters and must be published as several TXT strings",
                record_value.len()
            ),
        ));
    }

    let record_name = format!("_dmarc.{domain}");
    debug!("Generated DMARC record {}: {}", record_name, record_value);

    Ok(DmarcRecord {
        record_name,
        record_value,
        errors,
        warnings,
    })
}
