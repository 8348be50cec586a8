//! Propagation tracking across a panel of public resolvers.
//!
//! This module provides:
//! - Polling sessions (`polling` → `completed` | `timeout` | `cancelled`)
//! - Per-record consensus: a record counts only when every resolver agrees
//! - Completion time estimates from the progress made so far

mod consensus;
mod poller;
mod types;

// Re-export public API
pub use consensus::{
    estimate_completion, percentage, DnsServerQueryResult, MultiServerQueryResult, PanelResolver,
};
pub use poller::{ProgressReport, PropagationPoller};
pub use types::{PollingOptions, PollingSession, SessionMetadata, SessionStatus};
