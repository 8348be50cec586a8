//! On-demand propagation polling.
//!
//! Nothing here runs in the background. A session moves forward only when the
//! caller invokes `check_polling_progress`, typically on a fixed cadence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::QUERY_TIMEOUT_SECS;
use crate::dns::{query_record_values, DnsQuery};
use crate::error_handling::{AuthError, DnsErrorKind, QueryOutcome, QueryStats, SessionError};
use crate::records::ExpectedRecord;

use super::consensus::{
    estimate_completion, percentage, DnsServerQueryResult, MultiServerQueryResult, PanelResolver,
};
use super::types::{PollingOptions, PollingSession, SessionMetadata, SessionStatus};

/// Outcome of one progress check.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    /// Session state after the check.
    pub session: PollingSession,
    pub records: Vec<MultiServerQueryResult>,
    /// Non-zero query outcome counts for this check, in a fixed order.
    pub stats: Vec<(QueryOutcome, usize)>,
    /// "Still propagating" notes for SERVFAIL and timeouts.
    pub notes: Vec<String>,
    /// False when the session turned terminal while the check was running and
    /// the results were discarded.
    pub applied: bool,
}

struct SessionEntry {
    /// Serializes checks of one session.
    check: tokio::sync::Mutex<()>,
    state: Mutex<PollingSession>,
}

impl SessionEntry {
    fn new(session: PollingSession) -> Self {
        Self {
            check: tokio::sync::Mutex::new(()),
            state: Mutex::new(session),
        }
    }

    fn state(&self) -> MutexGuard<'_, PollingSession> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Default)]
struct SessionTable {
    by_id: HashMap<String, Arc<SessionEntry>>,
    /// Domain id to the id of the last session activated for it. The session
    /// may have ended since; readers check its status.
    active_by_domain: HashMap<String, String>,
}

impl SessionTable {
    /// Cancels the session currently active for `domain_id`, unless it is `keep`.
    fn supersede(&self, domain_id: &str, keep: &str) {
        let Some(prior) = self
            .active_by_domain
            .get(domain_id)
            .filter(|id| id.as_str() != keep)
            .and_then(|id| self.by_id.get(id))
        else {
            return;
        };
        let mut prior = prior.state();
        if prior.is_active() {
            info!(
                "Cancelling polling session {} for {}: superseded by {}",
                prior.id, prior.domain_id, keep
            );
            prior.status = SessionStatus::Cancelled;
            prior.estimated_completion = None;
        }
    }

    fn remove(&mut self, session_id: &str) -> Option<Arc<SessionEntry>> {
        let entry = self.by_id.remove(session_id)?;
        let domain_id = entry.state().domain_id.clone();
        if self.active_by_domain.get(&domain_id).map(String::as_str) == Some(session_id) {
            self.active_by_domain.remove(&domain_id);
        }
        Some(entry)
    }
}

/// Tracks polling sessions and checks them against a resolver panel.
///
/// Finished sessions stay readable until `remove_session` or `prune_terminal`
/// hands them back to the caller.
pub struct PropagationPoller<C> {
    panel: Vec<PanelResolver<C>>,
    query_timeout: Duration,
    sessions: RwLock<SessionTable>,
}

impl<C: DnsQuery> PropagationPoller<C> {
    pub fn new(panel: Vec<PanelResolver<C>>) -> Self {
        Self {
            panel,
            query_timeout: Duration::from_secs(QUERY_TIMEOUT_SECS),
            sessions: RwLock::new(SessionTable::default()),
        }
    }

    /// Upper bound for a single resolver query; a slower answer counts as a timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn panel(&self) -> &[PanelResolver<C>] {
        &self.panel
    }

    fn entry(&self, session_id: &str) -> Result<Arc<SessionEntry>, SessionError> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_id
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Creates a session in `polling` state.
    ///
    /// A session still polling for the same domain is cancelled first: only one
    /// session per domain is active at a time.
    ///
    /// # Errors
    ///
    /// `AuthError::Validation` for an empty domain id or no expected records.
    pub fn start_polling_session(
        &self,
        domain_id: &str,
        user_id: &str,
        expected_records: Vec<ExpectedRecord>,
        options: PollingOptions,
    ) -> Result<PollingSession, AuthError> {
        if domain_id.trim().is_empty() {
            return Err(AuthError::Validation("domain id is required".to_string()));
        }
        if expected_records.is_empty() {
            return Err(AuthError::Validation(
                "a polling session needs at least one expected record".to_string(),
            ));
        }

        let session = PollingSession {
            id: new_session_id(),
            domain_id: domain_id.to_string(),
            user_id: user_id.to_string(),
            status: SessionStatus::Polling,
            check_interval: options.check_interval,
            max_duration: options.max_duration,
            started_at: Utc::now(),
            last_checked_at: None,
            completed_at: None,
            estimated_completion: None,
            total_records: expected_records.len(),
            propagated_records: 0,
            overall_progress: 0,
            metadata: SessionMetadata {
                expected_records,
                resolvers: self.panel.iter().map(|r| r.endpoint.name.clone()).collect(),
                check_count: 0,
                last_notes: Vec::new(),
            },
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.supersede(&session.domain_id, &session.id);
        sessions
            .active_by_domain
            .insert(session.domain_id.clone(), session.id.clone());
        sessions
            .by_id
            .insert(session.id.clone(), Arc::new(SessionEntry::new(session.clone())));

        info!(
            "Started polling session {} for {} ({} records, {} resolvers)",
            session.id,
            session.domain_id,
            session.total_records,
            self.panel.len()
        );
        Ok(session)
    }

    /// Re-registers a session loaded from external storage.
    ///
    /// An active restored session supersedes any other active session for its
    /// domain, as if it had just been started.
    pub fn restore_session(&self, session: PollingSession) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if session.is_active() {
            sessions.supersede(&session.domain_id, &session.id);
            sessions
                .active_by_domain
                .insert(session.domain_id.clone(), session.id.clone());
        }
        debug!("Restored polling session {} ({})", session.id, session.status);
        sessions
            .by_id
            .insert(session.id.clone(), Arc::new(SessionEntry::new(session)));
    }

    pub fn get_polling_session(&self, session_id: &str) -> Result<PollingSession, AuthError> {
        Ok(self.entry(session_id)?.state().clone())
    }

    /// The session currently polling for `domain_id`, if any.
    pub fn active_session(&self, domain_id: &str) -> Option<PollingSession> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let id = sessions.active_by_domain.get(domain_id)?;
        let session = sessions.by_id.get(id)?.state().clone();
        session.is_active().then_some(session)
    }

    /// Number of sessions held in memory, finished ones included.
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_id
            .len()
    }

    /// Drops a finished session and returns its final state for storage.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` for an unknown id. A session still polling is
    /// refused with `AuthError::Validation`; cancel it first.
    pub fn remove_session(&self, session_id: &str) -> Result<PollingSession, AuthError> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let entry = sessions
            .by_id
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        if entry.state().is_active() {
            return Err(AuthError::Validation(format!(
                "polling session {session_id} is still active"
            )));
        }
        let entry = sessions
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let session = entry.state().clone();
        debug!("Removed polling session {} ({})", session.id, session.status);
        Ok(session)
    }

    /// Drops every finished session, returning their final states.
    pub fn prune_terminal(&self) -> Vec<PollingSession> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let finished: Vec<String> = sessions
            .by_id
            .iter()
            .filter(|(_, entry)| entry.state().status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        let pruned: Vec<PollingSession> = finished
            .iter()
            .filter_map(|id| sessions.remove(id))
            .map(|entry| entry.state().clone())
            .collect();
        if !pruned.is_empty() {
            debug!("Pruned {} finished polling sessions", pruned.len());
        }
        pruned
    }

    /// Moves a polling session to `cancelled`.
    ///
    /// A check already in flight finishes its queries, but its results are discarded.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` for an unknown id, `SessionError::Terminal` if the
    /// session already ended.
    pub fn cancel_polling_session(&self, session_id: &str) -> Result<PollingSession, AuthError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.state();
        if session.status.is_terminal() {
            return Err(SessionError::Terminal {
                id: session.id.clone(),
                status: session.status,
            }
            .into());
        }
        session.status = SessionStatus::Cancelled;
        session.estimated_completion = None;
        info!("Cancelled polling session {}", session.id);
        Ok(session.clone())
    }

    /// Queries every resolver of the panel for every expected record and
    /// advances the session.
    ///
    /// Completion (100 %) wins over timeout when both apply in the same check.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` or `SessionError::Terminal`; the session is not
    /// modified in either case. Resolver failures are never errors here.
    pub async fn check_polling_progress(&self, session_id: &str) -> Result<ProgressReport, AuthError> {
        let entry = self.entry(session_id)?;
        let _check = entry.check.lock().await;

        let expected_records = {
            let session = entry.state();
            if session.status.is_terminal() {
                return Err(SessionError::Terminal {
                    id: session.id.clone(),
                    status: session.status,
                }
                .into());
            }
            session.metadata.expected_records.clone()
        };

        let stats = QueryStats::new();
        let records = join_all(
            expected_records
                .into_iter()
                .map(|record| self.check_record(record)),
        )
        .await;

        let mut notes = Vec::new();
        for result in records.iter().flat_map(|r| r.results.iter()) {
            stats.record(result.outcome());
            if let Some(kind @ (DnsErrorKind::ServerFail | DnsErrorKind::Timeout)) = result.error {
                notes.push(format!(
                    "{} answered {} for {} {}: still propagating",
                    result.resolver, kind, result.record_type, result.name
                ));
            }
        }

        let propagated = records.iter().filter(|r| r.is_propagated).count();
        let mut session = entry.state();
        if session.status.is_terminal() {
            info!(
                "Discarding check results for session {}: it is now {}",
                session.id, session.status
            );
            return Ok(ProgressReport {
                session: session.clone(),
                records,
                stats: stats.snapshot(),
                notes,
                applied: false,
            });
        }

        let now = Utc::now();
        session.last_checked_at = Some(now);
        session.propagated_records = propagated;
        session.overall_progress = percentage(propagated, session.total_records);
        session.metadata.check_count += 1;
        session.metadata.last_notes = notes.clone();

        if session.overall_progress == 100 {
            session.status = SessionStatus::Completed;
            session.completed_at = Some(now);
            session.estimated_completion = Some(now);
            info!(
                "Polling session {} completed: all {} records propagated",
                session.id, session.total_records
            );
        } else if session.elapsed(now) >= session.max_duration {
            session.status = SessionStatus::Timeout;
            session.estimated_completion = None;
            warn!(
                "Polling session {} timed out at {}% ({}/{} records)",
                session.id, session.overall_progress, propagated, session.total_records
            );
        } else {
            session.estimated_completion =
                estimate_completion(session.started_at, now, session.overall_progress);
            debug!(
                "Polling session {}: {}% ({}/{} records)",
                session.id, session.overall_progress, propagated, session.total_records
            );
        }

        Ok(ProgressReport {
            session: session.clone(),
            records,
            stats: stats.snapshot(),
            notes,
            applied: true,
        })
    }

    /// Asks every resolver of the panel for one record, concurrently.
    pub async fn check_record(&self, record: ExpectedRecord) -> MultiServerQueryResult {
        let results = join_all(
            self.panel
                .iter()
                .map(|resolver| self.query_resolver(resolver, &record)),
        )
        .await;
        MultiServerQueryResult::from_results(record, results)
    }

    async fn query_resolver(
        &self,
        resolver: &PanelResolver<C>,
        record: &ExpectedRecord,
    ) -> DnsServerQueryResult {
        let started = tokio::time::Instant::now();
        let answer = tokio::time::timeout(
            self.query_timeout,
            query_record_values(&resolver.client, record.record_type, &record.name),
        )
        .await;
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (values, error) = match answer {
            Ok(Ok(values)) => (values, None),
            Ok(Err(e)) => (Vec::new(), Some(e.kind)),
            Err(_) => (Vec::new(), Some(DnsErrorKind::Timeout)),
        };
        let matched = error.is_none() && record.matches(&values);
        debug!(
            "{} {} via {}: {} ({} ms)",
            record.record_type,
            record.name,
            resolver.endpoint.name,
            match error {
                Some(kind) => kind.to_string(),
                None if matched => "match".to_string(),
                None => format!("mismatch {values:?}"),
            },
            response_time_ms
        );

        DnsServerQueryResult {
            resolver: resolver.endpoint.name.clone(),
            address: resolver.endpoint.address,
            record_type: record.record_type,
            name: record.name.clone(),
            values,
            matched,
            error,
            response_time_ms,
        }
    }
}

/// `poll_<unix millis>_<random hex>`.
fn new_session_id() -> String {
    format!(
        "poll_{}_{:08x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}
