//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, SPF/TXT limits, polling defaults)
//! - Logging option types
//! - The resolver panel used for propagation checks

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Config, LogFormat, LogLevel, ResolverEndpoint};
