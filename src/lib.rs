//! domain_auth library: email authentication records for custom domains
//!
//! This library generates the DNS records a sending domain needs (SPF, DKIM,
//! DMARC, MX, tracking CNAME and ownership verification), flattens SPF records
//! under the 10-lookup limit, and tracks propagation of published records across
//! a panel of public resolvers.
//!
//! # Example
//!
//! ```no_run
//! use domain_auth::dns::HickoryDnsClient;
//! use domain_auth::spf::{flatten_spf, FlattenOptions};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HickoryDnsClient::system(Duration::from_secs(3));
//! let result = flatten_spf(&client, &FlattenOptions::new("example.com")).await?;
//! println!(
//!     "{} ({} -> {} lookups)",
//!     result.flattened_record, result.lookup_count_before, result.lookup_count_after
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! DNS and propagation operations are async and require a Tokio runtime.
//! Record generation is synchronous and performs no I/O.

pub mod config;
pub mod dns;
pub mod error_handling;
pub mod initialization;
pub mod orchestration;
pub mod propagation;
pub mod records;
pub mod spf;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel, ResolverEndpoint};
pub use dns::{DnsQuery, HickoryDnsClient, MockDnsClient, RecordKind};
pub use error_handling::{AuthError, ErrorKind, Issue};
pub use orchestration::{DnsRecordSink, DomainAuthOrchestrator, DomainSetupRequest};
pub use propagation::{PollingOptions, PollingSession, PropagationPoller, SessionStatus};
pub use records::{DnsRecordSpec, ExpectedRecord, Provider, RecordSet};
pub use spf::{flatten_spf, FlattenOptions, FlattenedSpfResult};
