//! Shared record generation types.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_RECORD_TTL;
use crate::dns::{normalize_value, RecordKind};
use crate::error_handling::{AuthError, Issue};

static LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:_?[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)$").expect("label regex is valid")
});

/// Mailbox provider the records are generated for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    GoogleWorkspace,
    Custom,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GoogleWorkspace => "google_workspace",
            Provider::Custom => "custom",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "google_workspace" | "google" => Ok(Provider::GoogleWorkspace),
            "custom" => Ok(Provider::Custom),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// A record in the shape the registrar API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordSpec {
    #[serde(rename = "type")]
    pub record_type: RecordKind,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

impl DnsRecordSpec {
    pub fn txt(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            record_type: RecordKind::Txt,
            name: name.into(),
            content: content.into(),
            ttl: DEFAULT_RECORD_TTL,
            priority: None,
            proxied: None,
        }
    }

    pub fn mx(name: impl Into<String>, exchange: impl Into<String>, priority: u16) -> Self {
        Self {
            record_type: RecordKind::Mx,
            name: name.into(),
            content: exchange.into(),
            ttl: DEFAULT_RECORD_TTL,
            priority: Some(priority),
            proxied: None,
        }
    }

    /// CNAME that is never proxied through a CDN.
    pub fn cname(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            record_type: RecordKind::Cname,
            name: name.into(),
            content: target.into(),
            ttl: DEFAULT_RECORD_TTL,
            priority: None,
            proxied: Some(false),
        }
    }

    /// The value resolvers should answer once this record has propagated.
    pub fn expected(&self) -> ExpectedRecord {
        let value = match (self.record_type, self.priority) {
            (RecordKind::Mx, Some(priority)) => format!("{priority} {}", self.content),
            _ => self.content.clone(),
        };
        ExpectedRecord::new(self.record_type, self.name.clone(), value)
    }
}

/// A record whose propagation is tracked.
///
/// `value` is compared after normalization, so `"1 SMTP.google.com."` and
/// `"1 smtp.google.com"` match, and split TXT strings match their joined form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedRecord {
    pub record_type: RecordKind,
    pub name: String,
    pub value: String,
}

impl ExpectedRecord {
    pub fn new(record_type: RecordKind, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            record_type,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn normalized_value(&self) -> String {
        normalize_value(self.record_type, &self.value)
    }

    /// True when the expected value is among `observed` (already normalized).
    pub fn matches(&self, observed: &[String]) -> bool {
        let expected = self.normalized_value();
        observed.iter().any(|value| *value == expected)
    }
}

impl fmt::Display for ExpectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.record_type, self.name, self.value)
    }
}

/// Common view over every generator output.
pub trait RecordSet {
    /// Records to submit to the registrar. Empty when generation produced errors
    /// that leave nothing publishable.
    fn dns_records(&self) -> Vec<DnsRecordSpec>;

    fn errors(&self) -> &[Issue];

    fn warnings(&self) -> &[Issue];

    fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    fn expected_records(&self) -> Vec<ExpectedRecord> {
        self.dns_records().iter().map(DnsRecordSpec::expected).collect()
    }
}

/// Validates and normalizes a domain name (lowercase, no trailing dot).
pub(crate) fn normalize_domain_name(domain: &str) -> Result<String, AuthError> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return Err(AuthError::Validation("domain is required".to_string()));
    }
    if domain.len() > 253 || !domain.contains('.') {
        return Err(AuthError::Validation(format!("invalid domain: {domain}")));
    }
    if !domain.split('.').all(|label| LABEL_REGEX.is_match(label)) {
        return Err(AuthError::Validation(format!("invalid domain: {domain}")));
    }
    Ok(domain)
}

/// Validates a single DNS label used as a selector or subdomain.
pub(crate) fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.split('.').all(|part| LABEL_REGEX.is_match(part))
}

/// Splits a TXT value into character-strings of at most `max` characters.
///
/// Joining the pieces gives back `value` exactly.
pub fn split_txt_value(value: &str, max: usize) -> Vec<String> {
    if max == 0 {
        return vec![value.to_string()];
    }
    let chars: Vec<char> = value.chars().collect();
    chars
        .chunks(max)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Renders character-strings in zone-file form: `"a" "b"`.
pub fn quote_txt_strings(parts: &[String]) -> String {
    parts
        .iter()
        .map(|part| format!("\"{}\"", part.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(" ")
}
