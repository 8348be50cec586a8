//! Generate → submit → poll.

use std::sync::atomic::{AtomicU32, Ordering};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio_retry::RetryIf;

use crate::dns::{extract_dmarc_record, DnsQuery};
use crate::error_handling::{get_retry_strategy, AuthError, DnsErrorKind, Issue, RegistrarError};
use crate::propagation::{PollingOptions, PollingSession, ProgressReport, PropagationPoller};
use crate::records::{
    generate_dkim, generate_dmarc, generate_mx, generate_spf, generate_tracking,
    generate_verification, parse_dmarc_policy, DkimOptions, DmarcOptions, DmarcPolicy,
    DnsRecordSpec, MxOptions, Provider, RecordSet, SpfOptions, TrackingOptions,
};

use super::sink::DnsRecordSink;

/// Everything needed to set up email authentication for one domain.
///
/// The request's `domain` applies to every record; the `domain` fields of the
/// nested options are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSetupRequest {
    pub domain: String,
    pub domain_id: String,
    pub user_id: String,
    /// Registrar zone the records are created in.
    pub zone_id: String,
    pub spf: Option<SpfOptions>,
    pub dkim: Option<DkimOptions>,
    pub dmarc: Option<DmarcOptions>,
    pub mx: Option<MxOptions>,
    pub tracking: Option<TrackingOptions>,
    pub verification_token: Option<String>,
}

impl DomainSetupRequest {
    pub fn new(
        domain: impl Into<String>,
        domain_id: impl Into<String>,
        user_id: impl Into<String>,
        zone_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            domain_id: domain_id.into(),
            user_id: user_id.into(),
            zone_id: zone_id.into(),
            spf: None,
            dkim: None,
            dmarc: None,
            mx: None,
            tracking: None,
            verification_token: None,
        }
    }

    /// Google Workspace defaults: SPF include, Google MX and a monitoring-only DMARC policy.
    pub fn google_workspace(
        domain: impl Into<String>,
        domain_id: impl Into<String>,
        user_id: impl Into<String>,
        zone_id: impl Into<String>,
    ) -> Self {
        let mut request = Self::new(domain, domain_id, user_id, zone_id);
        request.spf = Some(SpfOptions::new(request.domain.clone(), Provider::GoogleWorkspace));
        request.mx = Some(MxOptions::new(request.domain.clone(), Provider::GoogleWorkspace));
        request.dmarc = Some(DmarcOptions::new(request.domain.clone(), DmarcPolicy::None));
        request
    }

    pub fn with_dkim_key(mut self, provider: Provider, public_key: impl Into<String>) -> Self {
        self.dkim = Some(DkimOptions::new(self.domain.clone(), provider, public_key));
        self
    }

    pub fn with_tracking(mut self, target: impl Into<String>) -> Self {
        self.tracking = Some(TrackingOptions::new(self.domain.clone(), target));
        self
    }

    pub fn with_verification_token(mut self, token: impl Into<String>) -> Self {
        self.verification_token = Some(token.into());
        self
    }

    /// Runs every configured generator.
    ///
    /// Record sets that report errors are left out of `records`; their errors
    /// are carried over.
    ///
    /// # Errors
    ///
    /// The first hard validation failure of any generator.
    pub fn generate(&self) -> Result<GeneratedRecords, AuthError> {
        let mut generated = GeneratedRecords::default();
        let domain = self.domain.clone();

        if let Some(token) = &self.verification_token {
            generated.absorb(&generate_verification(&domain, token)?);
        }
        if let Some(options) = &self.spf {
            let options = SpfOptions {
                domain: domain.clone(),
                ..options.clone()
            };
            generated.absorb(&generate_spf(&options)?);
        }
        if let Some(options) = &self.mx {
            let options = MxOptions {
                domain: domain.clone(),
                ..options.clone()
            };
            generated.absorb(&generate_mx(&options)?);
        }
        if let Some(options) = &self.dkim {
            let options = DkimOptions {
                domain: domain.clone(),
                ..options.clone()
            };
            generated.absorb(&generate_dkim(&options)?);
        }
        if let Some(options) = &self.dmarc {
            let options = DmarcOptions {
                domain: domain.clone(),
                ..options.clone()
            };
            generated.absorb(&generate_dmarc(&options)?);
        }
        if let Some(options) = &self.tracking {
            let options = TrackingOptions {
                domain,
                ..options.clone()
            };
            generated.absorb(&generate_tracking(&options)?);
        }

        Ok(generated)
    }
}

/// Records ready for submission plus everything the generators reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRecords {
    pub records: Vec<DnsRecordSpec>,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl GeneratedRecords {
    fn absorb(&mut self, set: &impl RecordSet) {
        if set.is_valid() {
            self.records.extend(set.dns_records());
        }
        self.errors.extend_from_slice(set.errors());
        self.warnings.extend_from_slice(set.warnings());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedRecord {
    pub record_id: String,
    pub record: DnsRecordSpec,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSubmission {
    pub record: DnsRecordSpec,
    pub error: RegistrarError,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupOutcome {
    /// Tracks every record that was accepted by the registrar.
    pub session: PollingSession,
    pub submitted: Vec<SubmittedRecord>,
    pub failed: Vec<FailedSubmission>,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

/// Facade over the generators, the registrar sink and the propagation poller.
pub struct DomainAuthOrchestrator<C, S> {
    poller: PropagationPoller<C>,
    sink: S,
    polling: PollingOptions,
}

impl<C: DnsQuery, S: DnsRecordSink> DomainAuthOrchestrator<C, S> {
    pub fn new(poller: PropagationPoller<C>, sink: S) -> Self {
        Self {
            poller,
            sink,
            polling: PollingOptions::default(),
        }
    }

    pub fn with_polling_options(mut self, polling: PollingOptions) -> Self {
        self.polling = polling;
        self
    }

    pub fn poller(&self) -> &PropagationPoller<C> {
        &self.poller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Generates the records, submits them and starts a polling session for
    /// the ones the registrar accepted.
    ///
    /// Unless the request names it, the DMARC policy currently published for
    /// the domain is read first so that policy progression is enforced.
    ///
    /// # Errors
    ///
    /// Validation failures, nothing to publish, or every submission failing
    /// (the first registrar error is returned).
    pub async fn setup_domain(&self, request: &DomainSetupRequest) -> Result<SetupOutcome, AuthError> {
        let request = self.with_published_dmarc_policy(request).await;
        let generated = request.generate()?;
        if generated.records.is_empty() {
            let reasons: Vec<String> = generated.errors.iter().map(|e| e.to_string()).collect();
            return Err(AuthError::Validation(format!(
                "no publishable records for {}: {}",
                request.domain,
                reasons.join("; ")
            )));
        }

        let mut submitted = Vec::new();
        let mut failed = Vec::new();
        for record in &generated.records {
            let (result, attempts) = self.submit(&request.zone_id, record).await;
            match result {
                Ok(record_id) => {
                    info!(
                        "Created {} {} as {} ({} attempt(s))",
                        record.record_type, record.name, record_id, attempts
                    );
                    submitted.push(SubmittedRecord {
                        record_id,
                        record: record.clone(),
                        attempts,
                    });
                }
                Err(error) => {
                    warn!("Giving up on {} {}: {}", record.record_type, record.name, error);
                    failed.push(FailedSubmission {
                        record: record.clone(),
                        error,
                        attempts,
                    });
                }
            }
        }

        if submitted.is_empty() {
            return Err(match failed.into_iter().next() {
                Some(failure) => AuthError::Registrar(failure.error),
                None => AuthError::Validation("no records were submitted".to_string()),
            });
        }

        let expected = submitted.iter().map(|s| s.record.expected()).collect();
        let session = self.poller.start_polling_session(
            &request.domain_id,
            &request.user_id,
            expected,
            self.polling,
        )?;

        Ok(SetupOutcome {
            session,
            submitted,
            failed,
            errors: generated.errors,
            warnings: generated.warnings,
        })
    }

    pub async fn check_status(&self, session_id: &str) -> Result<ProgressReport, AuthError> {
        self.poller.check_polling_progress(session_id).await
    }

    pub fn cancel(&self, session_id: &str) -> Result<PollingSession, AuthError> {
        self.poller.cancel_polling_session(session_id)
    }

    /// Hands back every finished session for storage and forgets it.
    pub fn take_finished_sessions(&self) -> Vec<PollingSession> {
        self.poller.prune_terminal()
    }

    async fn with_published_dmarc_policy(&self, request: &DomainSetupRequest) -> DomainSetupRequest {
        let mut request = request.clone();
        let wanted = request
            .dmarc
            .as_ref()
            .is_some_and(|options| options.existing_policy.is_none());
        let Some(resolver) = self.poller.panel().first().filter(|_| wanted) else {
            return request;
        };

        let name = format!("_dmarc.{}", request.domain.trim().trim_end_matches('.'));
        let published = match resolver.client.query_txt(&name).await {
            Ok(txt) => extract_dmarc_record(&txt).and_then(|record| parse_dmarc_policy(&record)),
            Err(e) if matches!(e.kind, DnsErrorKind::NotFound | DnsErrorKind::NoData) => None,
            Err(e) => {
                warn!("Could not read the published DMARC policy: {}", e);
                None
            }
        };
        if let (Some(policy), Some(options)) = (published, request.dmarc.as_mut()) {
            info!("{} currently publishes DMARC p={}", request.domain, policy);
            options.existing_policy = Some(policy);
        }
        request
    }

    /// Submits one record, retrying retryable registrar errors with backoff.
    async fn submit(&self, zone_id: &str, record: &DnsRecordSpec) -> (Result<String, RegistrarError>, u32) {
        let attempts = AtomicU32::new(0);
        let result = RetryIf::spawn(
            get_retry_strategy(),
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                self.sink.create_dns_record(zone_id, record)
            },
            |error: &RegistrarError| {
                if error.retryable {
                    warn!("Retrying {} {}: {}", record.record_type, record.name, error);
                }
                error.retryable
            },
        )
        .await;
        (result, attempts.load(Ordering::SeqCst))
    }
}
