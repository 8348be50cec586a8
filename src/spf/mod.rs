//! SPF parsing and flattening.
//!
//! This module provides:
//! - A parser for SPF records (mechanisms, qualifiers, modifiers)
//! - Lookup counting without network I/O
//! - A breadth-first flattener that replaces `include`/`a`/`mx` terms with the
//!   IP ranges they resolve to, under the 10-lookup budget

mod flatten;
mod mechanism;
mod types;

// Re-export public API
pub use flatten::{flatten_spf, SpfFlattener};
pub use mechanism::{
    count_spf_lookups, parse_spf, DualCidr, MechanismKind, Qualifier, SpfMechanism, SpfModifier,
    SpfParseError, SpfRecord,
};
pub(crate) use mechanism::validate_network;
pub use types::{FlattenOptions, FlattenedSpfResult, LookupBudget, SpfIncludeChain};

#[cfg(test)]
mod tests;
