//! DKIM public-key record generation.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DKIM_SELECTOR, DNS_TXT_STRING_MAX, GOOGLE_DKIM_SELECTOR};
use crate::error_handling::{AuthError, ErrorKind, Issue};

use super::types::{
    is_valid_label, normalize_domain_name, quote_txt_strings, split_txt_value, DnsRecordSpec,
    Provider, RecordSet,
};

static BASE64_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("base64 regex is valid"));

/// Key sizes accepted for generated DKIM records.
pub const SUPPORTED_KEY_LENGTHS: [u32; 2] = [1024, 2048];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkimOptions {
    pub domain: String,
    pub provider: Provider,
    /// Defaults to the provider's selector.
    pub selector: Option<String>,
    /// Declared RSA key size in bits.
    pub key_length: Option<u32>,
    /// Base64 public key, optionally wrapped in PEM armor.
    pub public_key: String,
    pub split_for_dns_limit: bool,
}

impl DkimOptions {
    pub fn new(domain: impl Into<String>, provider: Provider, public_key: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            provider,
            selector: None,
            key_length: None,
            public_key: public_key.into(),
            split_for_dns_limit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkimRecord {
    pub selector: String,
    pub record_name: String,
    pub record_value: String,
    /// Character-strings of at most 255 characters; empty unless the value needed splitting.
    pub split_values: Vec<String>,
    pub requires_splitting: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl RecordSet for DkimRecord {
    fn dns_records(&self) -> Vec<DnsRecordSpec> {
        if !self.is_valid() {
            return Vec::new();
        }
        let content = if self.split_values.is_empty() {
            self.record_value.clone()
        } else {
            quote_txt_strings(&self.split_values)
        };
        vec![DnsRecordSpec::txt(self.record_name.clone(), content)]
    }

    fn errors(&self) -> &[Issue] {
        &self.errors
    }

    fn warnings(&self) -> &[Issue] {
        &self.warnings
    }
}

/// Strips PEM armor and whitespace from a public key.
fn clean_public_key(key: &str) -> String {
    key.lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(|line| line.split_whitespace())
        .collect()
}

/// Approximate RSA modulus size from the DER length of a SubjectPublicKeyInfo.
fn estimate_key_bits(base64_len: usize, padding: usize) -> Option<u32> {
    let der_len = (base64_len / 4) * 3 - padding;
    match der_len {
        150..=180 => Some(1024),
        280..=310 => Some(2048),
        _ => None,
    }
}

/// Builds the `{selector}._domainkey.{domain}` TXT record.
///
/// # Errors
///
/// Invalid domain or selector, a missing or non-base64 key, or a declared key
/// length other than 1024/2048.
pub fn generate_dkim(options: &DkimOptions) -> Result<DkimRecord, AuthError> {
    let domain = normalize_domain_name(&options.domain)?;

    let selector = match &options.selector {
        Some(selector) => selector.trim().to_ascii_lowercase(),
        None => match options.provider {
            Provider::GoogleWorkspace => GOOGLE_DKIM_SELECTOR.to_string(),
            Provider::Custom => DEFAULT_DKIM_SELECTOR.to_string(),
        },
    };
    if !is_valid_label(&selector) {
        return Err(AuthError::Validation(format!("invalid DKIM selector: {selector:?}")));
    }

    if let Some(bits) = options.key_length {
        if !SUPPORTED_KEY_LENGTHS.contains(&bits) {
            return Err(AuthError::Validation(format!(
                "unsupported DKIM key length {bits}; expected 1024 or 2048"
            )));
        }
    }

    let key = clean_public_key(&options.public_key);
    if key.is_empty() {
        return Err(AuthError::Validation("DKIM public key is required".to_string()));
    }
    if key.len() % 4 != 0 || !BASE64_REGEX.is_match(&key) {
        return Err(AuthError::Validation(
            "DKIM public key is not valid base64".to_string(),
        ));
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let padding = key.len() - key.trim_end_matches('=').len();
    match (estimate_key_bits(key.len(), padding), options.key_length) {
        (Some(actual), Some(declared)) if actual != declared => warnings.push(Issue::new(
            ErrorKind::Validation,
            format!("public key looks like a {actual}-bit key but {declared} bits were declared"),
        )),
        (None, _) => warnings.push(Issue::new(
            ErrorKind::Validation,
            "could not determine the public key size".to_string(),
        )),
        _ => {}
    }

    let record_name = format!("{selector}._domainkey.{domain}");
    let record_value = format!("v=DKIM1; k=rsa; p={key}");
    let requires_splitting = record_value.len() > DNS_TXT_STRING_MAX;

    let split_values = if !requires_splitting {
        Vec::new()
    } else if options.split_for_dns_limit {
        split_txt_value(&record_value, DNS_TXT_STRING_MAX)
    } else {
        errors.push(Issue::new(
            ErrorKind::CharacterLimitExceeded,
            format!(
                "DKIM value is {} characters; it must be split into {DNS_TXT_STRING_MAX}-character strings",
                record_value.len()
            ),
        ));
        Vec::new()
    };

    debug!(
        "Generated DKIM record {} ({} chars, {} strings)",
        record_name,
        record_value.len(),
        split_values.len().max(1)
    );

    Ok(DkimRecord {
        selector,
        record_name,
        record_value,
        split_values,
        requires_splitting,
        errors,
        warnings,
    })
}
