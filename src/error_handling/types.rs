//! Error type definitions.
//!
//! This module defines the error taxonomy shared by the SPF flattener, the record
//! generators and the propagation poller, plus the hard-failure error enums.

use std::fmt;

use log::SetLoggerError;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::dns::RecordKind;
use crate::propagation::SessionStatus;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Categories of problems reported by the engine.
///
/// Best-effort results (flattened SPF, generated records, progress reports) carry
/// these in their `errors`/`warnings` lists instead of failing outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed SPF/DMARC/DKIM input, caught before any network call
    Validation,
    /// SPF needs more than 10 DNS lookups
    LookupBudgetExceeded,
    /// SPF above 512 characters, or a TXT string above 255
    CharacterLimitExceeded,
    /// SPF include cycle (recoverable)
    CircularReference,
    /// NXDOMAIN/NODATA/SERVFAIL/TIMEOUT from the query client
    ResolverError,
    /// Unknown or already-terminal polling session
    SessionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::LookupBudgetExceeded => "LOOKUP_BUDGET_EXCEEDED",
            ErrorKind::CharacterLimitExceeded => "CHARACTER_LIMIT_EXCEEDED",
            ErrorKind::CircularReference => "CIRCULAR_REFERENCE",
            ErrorKind::ResolverError => "RESOLVER_ERROR",
            ErrorKind::SessionError => "SESSION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single error or warning attached to a best-effort result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: ErrorKind,
    pub message: String,
}

impl Issue {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Classification of a failed DNS query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsErrorKind {
    /// NXDOMAIN: the name does not exist
    NotFound,
    /// The name exists but has no records of the requested type
    NoData,
    /// SERVFAIL or another resolver-side inconsistency
    ServerFail,
    /// No answer within the timeout
    Timeout,
}

impl DnsErrorKind {
    /// SERVFAIL and timeouts are transient; NXDOMAIN and NODATA are answers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DnsErrorKind::ServerFail | DnsErrorKind::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DnsErrorKind::NotFound => "NXDOMAIN",
            DnsErrorKind::NoData => "NODATA",
            DnsErrorKind::ServerFail => "SERVFAIL",
            DnsErrorKind::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for DnsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified DNS query failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{record_type} lookup for {domain} failed: {kind}")]
pub struct DnsQueryError {
    pub kind: DnsErrorKind,
    pub domain: String,
    pub record_type: RecordKind,
}

impl DnsQueryError {
    pub fn new(kind: DnsErrorKind, domain: impl Into<String>, record_type: RecordKind) -> Self {
        Self {
            kind,
            domain: domain.into(),
            record_type,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Errors raised when operating on polling sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("polling session {0} not found")]
    NotFound(String),

    #[error("polling session {id} is already {status}")]
    Terminal { id: String, status: SessionStatus },
}

/// Failure reported by the registrar/DNS-zone API.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("registrar rejected {record_name}: {message}")]
pub struct RegistrarError {
    pub record_name: String,
    pub message: String,
    /// Whether resubmitting the same record may succeed (rate limits, 5xx)
    pub retryable: bool,
}

/// Hard failures of engine operations.
///
/// Partial failures never surface here; they are reported as [`Issue`]s on the
/// returned result instead.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no SPF record published for {0}")]
    NoSpfRecord(String),

    #[error(transparent)]
    Dns(#[from] DnsQueryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Registrar(#[from] RegistrarError),
}

impl AuthError {
    /// Engine taxonomy category; registrar failures sit outside it.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AuthError::Validation(_) => Some(ErrorKind::Validation),
            AuthError::NoSpfRecord(_) | AuthError::Dns(_) => Some(ErrorKind::ResolverError),
            AuthError::Session(_) => Some(ErrorKind::SessionError),
            AuthError::Registrar(_) => None,
        }
    }
}
