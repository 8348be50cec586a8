//! Record generators.
//!
//! Pure functions that turn provider configuration into DNS records:
//! - DKIM public-key TXT records, split to the 255-character string limit
//! - DMARC policy records with policy-progression checks
//! - MX sets, the warmup tracking CNAME, SPF base and site-verification TXT
//!
//! The same input always yields byte-identical output.

mod dkim;
mod dmarc;
mod mx;
mod tracking;
mod types;
mod verification;

// Re-export public API
pub use dkim::{generate_dkim, DkimOptions, DkimRecord, SUPPORTED_KEY_LENGTHS};
pub use dmarc::{
    generate_dmarc, parse_dmarc_policy, Alignment, DmarcOptions, DmarcPolicy, DmarcRecord,
};
pub use mx::{generate_mx, MxOptions, MxRecordSet};
pub use tracking::{generate_tracking, TrackingOptions, TrackingRecord};
pub use types::{
    quote_txt_strings, split_txt_value, DnsRecordSpec, ExpectedRecord, Provider, RecordSet,
};
pub use verification::{generate_spf, generate_verification, SpfOptions, TxtRecord};

#[cfg(test)]
mod tests;
