//! Domain setup orchestration.
//!
//! Sequences record generation, submission to the registrar and the start of a
//! propagation session, then reports status on demand.

mod orchestrator;
mod sink;

// Re-export public API
pub use orchestrator::{
    DomainAuthOrchestrator, DomainSetupRequest, FailedSubmission, GeneratedRecords, SetupOutcome,
    SubmittedRecord,
};
pub use sink::DnsRecordSink;
