//! Configuration types.
//!
//! This module defines the enums and structs used to configure the engine,
//! both programmatically and from the command line.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::constants::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_DURATION, DNS_TIMEOUT_SECS, QUERY_TIMEOUT_SECS,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// A public resolver queried during propagation checks.
///
/// Parsed from `name=address` (or a bare address, which is also used as the name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverEndpoint {
    /// Display name (e.g. "Google")
    pub name: String,
    /// Address of the resolver, queried on port 53
    pub address: IpAddr,
}

impl ResolverEndpoint {
    pub fn new(name: impl Into<String>, address: IpAddr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    /// The default panel: Google, Cloudflare and OpenDNS.
    pub fn default_panel() -> Vec<ResolverEndpoint> {
        vec![
            ResolverEndpoint::new("Google", IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
            ResolverEndpoint::new("Cloudflare", IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
            ResolverEndpoint::new("OpenDNS", IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222))),
        ]
    }
}

impl fmt::Display for ResolverEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

impl FromStr for ResolverEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, addr) = match s.split_once('=') {
            Some((name, addr)) => (name.trim(), addr.trim()),
            None => (s, s),
        };
        if name.is_empty() {
            return Err(format!("resolver name is empty in '{s}'"));
        }
        let address = addr
            .parse::<IpAddr>()
            .map_err(|e| format!("invalid resolver address '{addr}': {e}"))?;
        Ok(ResolverEndpoint::new(name, address))
    }
}

/// Library configuration (no CLI dependencies).
///
/// # Examples
///
/// ```no_run
/// use domain_auth::Config;
///
/// let config = Config {
///     check_interval_secs: 60,
///     ..Default::default()
/// };
/// assert_eq!(config.check_interval().as_secs(), 60);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Resolver timeout in seconds
    pub dns_timeout_secs: u64,

    /// Per-query timeout applied to each panel query during a progress check
    pub query_timeout_secs: u64,

    /// Resolvers queried for propagation consensus
    pub resolvers: Vec<ResolverEndpoint>,

    /// Expected cadence between progress checks, in seconds
    pub check_interval_secs: u64,

    /// Maximum polling duration before a session times out, in seconds
    pub max_duration_secs: u64,
}

impl Config {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            dns_timeout_secs: DNS_TIMEOUT_SECS,
            query_timeout_secs: QUERY_TIMEOUT_SECS,
            resolvers: ResolverEndpoint::default_panel(),
            check_interval_secs: DEFAULT_CHECK_INTERVAL.as_secs(),
            max_duration_secs: DEFAULT_MAX_DURATION.as_secs(),
        }
    }
}
