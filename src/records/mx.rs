//! MX record generation.

use serde::{Deserialize, Serialize};

use crate::config::{GOOGLE_MX_HOST, GOOGLE_MX_PRIORITY};
use crate::dns::MxRecord;
use crate::error_handling::{AuthError, ErrorKind, Issue};

use super::types::{normalize_domain_name, DnsRecordSpec, Provider, RecordSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxOptions {
    pub domain: String,
    pub provider: Provider,
    /// Records published as-is for [`Provider::Custom`].
    pub custom_records: Vec<MxRecord>,
}

impl MxOptions {
    pub fn new(domain: impl Into<String>, provider: Provider) -> Self {
        Self {
            domain: domain.into(),
            provider,
            custom_records: Vec::new(),
        }
    }

    pub fn with_record(mut self, priority: u16, exchange: impl Into<String>) -> Self {
        self.custom_records.push(MxRecord::new(priority, exchange));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxRecordSet {
    pub record_name: String,
    pub records: Vec<MxRecord>,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl RecordSet for MxRecordSet {
    fn dns_records(&self) -> Vec<DnsRecordSpec> {
        self.records
            .iter()
            .map(|mx| DnsRecordSpec::mx(self.record_name.clone(), mx.exchange.clone(), mx.priority))
            .collect()
    }

    fn errors(&self) -> &[Issue] {
        &self.errors
    }

    fn warnings(&self) -> &[Issue] {
        &self.warnings
    }
}

/// Builds the apex MX set for a provider.
pub fn generate_mx(options: &MxOptions) -> Result<MxRecordSet, AuthError> {
    let record_name = normalize_domain_name(&options.domain)?;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let records = match options.provider {
        Provider::GoogleWorkspace => {
            if !options.custom_records.is_empty() {
                warnings.push(Issue::new(
                    ErrorKind::Validation,
                    "custom MX records are ignored for Google Workspace".to_string(),
                ));
            }
            vec![MxRecord::new(GOOGLE_MX_PRIORITY, GOOGLE_MX_HOST)]
        }
        Provider::Custom => {
            if options.custom_records.is_empty() {
                errors.push(Issue::new(
                    ErrorKind::Validation,
                    "no MX records supplied for a custom provider".to_string(),
                ));
            }
            options.custom_records.clone()
        }
    };

    Ok(MxRecordSet {
        record_name,
        records,
        errors,
        warnings,
    })
}
