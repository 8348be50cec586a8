//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - Logger
//! - DNS resolvers (default upstream, or pinned to one public resolver)
//! - The propagation resolver panel

mod logger;
mod resolver;

use std::time::Duration;

use crate::config::ResolverEndpoint;
use crate::dns::HickoryDnsClient;
use crate::propagation::PanelResolver;

// Re-export public API
pub use logger::init_logger_with;
pub use resolver::{init_endpoint_resolver, init_resolver};

/// Builds one DNS client per configured resolver endpoint.
///
/// # Arguments
///
/// * `endpoints` - The resolver panel from configuration
/// * `timeout` - Resolver-level timeout for each query
pub fn init_panel(
    endpoints: &[ResolverEndpoint],
    timeout: Duration,
) -> Vec<PanelResolver<HickoryDnsClient>> {
    endpoints
        .iter()
        .map(|endpoint| {
            PanelResolver::new(
                endpoint.clone(),
                HickoryDnsClient::for_endpoint(endpoint, timeout),
            )
        })
        .collect()
}
