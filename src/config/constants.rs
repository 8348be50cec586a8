//! Configuration constants.
//!
//! This module defines the constants used throughout the engine: DNS timeouts,
//! SPF and TXT size limits, polling defaults and retry parameters.

use std::time::Duration;

// Network operation timeouts
/// DNS query timeout in seconds for the hickory resolver itself.
/// Most public resolvers answer in well under a second; 3s fails fast on dead servers.
pub const DNS_TIMEOUT_SECS: u64 = 3;
/// Upper bound on a single panel query during a propagation check.
/// Wraps the resolver timeout so one unreachable server cannot stall a check.
pub const QUERY_TIMEOUT_SECS: u64 = 5;
/// Resolver attempts per query. Retry policy belongs to the caller.
pub const DNS_ATTEMPTS: usize = 1;

// SPF limits (RFC 7208)
/// Maximum number of DNS-querying terms an SPF evaluation may cost.
pub const SPF_MAX_LOOKUPS: usize = 10;
/// Practical upper bound on the length of a published SPF record.
pub const SPF_MAX_CHARS: usize = 512;
/// Maximum number of MX hosts resolved when flattening an `mx` mechanism.
pub const SPF_MAX_MX_HOSTS: usize = 10;
/// Terminal mechanism used when the original record has none.
pub const SPF_DEFAULT_ALL: &str = "~all";

// TXT records
/// Maximum length of a single character-string inside a TXT record.
pub const DNS_TXT_STRING_MAX: usize = 255;
/// TTL applied to generated records, in seconds.
pub const DEFAULT_RECORD_TTL: u32 = 3600;

// Propagation polling
/// Cadence at which callers are expected to invoke a progress check.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// How long a session may poll before it times out (48 hours).
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(48 * 60 * 60);

// Retry strategy (registrar submissions)
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 15;
/// Maximum number of retries after the initial attempt
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// Provider constants
/// SPF include published by Google Workspace.
pub const GOOGLE_SPF_INCLUDE: &str = "_spf.google.com";
/// Single MX host documented by Google Workspace.
pub const GOOGLE_MX_HOST: &str = "smtp.google.com";
/// Priority of the Google Workspace MX host.
pub const GOOGLE_MX_PRIORITY: u16 = 1;
/// DKIM selector Google Workspace uses by default.
pub const GOOGLE_DKIM_SELECTOR: &str = "google";
/// DKIM selector used for custom providers when none is given.
pub const DEFAULT_DKIM_SELECTOR: &str = "default";
/// Subdomain used for the warmup tracking CNAME when none is given.
pub const DEFAULT_TRACKING_SUBDOMAIN: &str = "emailtracking";
