//! Polling session data.
//!
//! Sessions are plain serializable data so an external store can persist them
//! between checks and hand them back via `PropagationPoller::restore_session`.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_DURATION};
use crate::records::ExpectedRecord;

/// Lifecycle state of a polling session.
///
/// `Polling` is the only non-terminal state; nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Polling,
    Completed,
    Timeout,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Polling)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Polling => "polling",
            SessionStatus::Completed => "completed",
            SessionStatus::Timeout => "timeout",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cadence and deadline for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingOptions {
    /// How often the caller intends to run a check. Informational only.
    pub check_interval: Duration,
    pub max_duration: Duration,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

impl From<&Config> for PollingOptions {
    fn from(config: &Config) -> Self {
        Self {
            check_interval: config.check_interval(),
            max_duration: config.max_duration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub expected_records: Vec<ExpectedRecord>,
    /// Display names of the resolvers queried on each check.
    pub resolvers: Vec<String>,
    pub check_count: u32,
    /// Notes from the most recent check (SERVFAIL, timeouts).
    pub last_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSession {
    pub id: String,
    pub domain_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub check_interval: Duration,
    pub max_duration: Duration,
    pub started_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub total_records: usize,
    pub propagated_records: usize,
    /// Percentage of expected records seen on every resolver, 0..=100.
    pub overall_progress: u8,
    pub metadata: SessionMetadata,
}

impl PollingSession {
    /// Time since the session started, zero if the clock went backwards.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).to_std().unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
