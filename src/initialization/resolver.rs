//! DNS resolver initialization.
//!
//! This module builds hickory resolvers with the engine's timeout settings:
//! one using the default upstream configuration, and one pinned to a single
//! resolver address for propagation checks.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

/// Resolver options shared by every resolver the engine builds.
///
/// Caching is disabled so each call reaches the network: a cached answer would
/// hide exactly the changes a propagation check is looking for.
fn resolver_opts(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = crate::config::DNS_ATTEMPTS;
    // Set ndots to 0 to prevent search domain appending
    opts.ndots = 0;
    opts.cache_size = 0;
    opts
}

/// Initializes the DNS resolver used for SPF resolution and ad-hoc lookups.
///
/// Uses hickory's default upstream configuration (Google public DNS).
///
/// # Returns
///
/// A configured `TokioAsyncResolver` wrapped in `Arc` for sharing across tasks.
pub fn init_resolver(timeout: Duration) -> Arc<TokioAsyncResolver> {
    Arc::new(TokioAsyncResolver::tokio(
        ResolverConfig::default(),
        resolver_opts(timeout),
    ))
}

/// Initializes a resolver that only queries `address` on port 53 (UDP, TCP fallback).
pub fn init_endpoint_resolver(address: IpAddr, timeout: Duration) -> Arc<TokioAsyncResolver> {
    let group = NameServerConfigGroup::from_ips_clear(&[address], 53, true);
    let config = ResolverConfig::from_parts(None, vec![], group);
    Arc::new(TokioAsyncResolver::tokio(config, resolver_opts(timeout)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_opts_disable_cache() {
        let opts = resolver_opts(Duration::from_secs(2));
        assert_eq!(opts.timeout, Duration::from_secs(2));
        assert_eq!(opts.cache_size, 0);
        assert_eq!(opts.ndots, 0);
        assert_eq!(opts.attempts, crate::config::DNS_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_init_endpoint_resolver_builds() {
        // Construction performs no I/O
        let resolver = init_endpoint_resolver("1.1.1.1".parse().unwrap(), Duration::from_secs(1));
        assert_eq!(Arc::strong_count(&resolver), 1);
    }
}
