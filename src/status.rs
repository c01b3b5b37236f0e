//! Platform status-code checking
//!
//! Every call into the audio platform that yields a raw status code goes
//! through [`StatusChecker`]. Success is silent and allocation free. Failure
//! produces a [`StatusDiagnostic`] for the diagnostic sink and a
//! [`StatusError`] for the caller to propagate.

use std::fmt;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Raw result code of a platform audio operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsStatus(pub i32);

impl OsStatus {
    pub const NO_ERR: Self = Self(0);

    /// Build a status from a four-character code such as `b"fmt?"`
    pub const fn from_four_cc(code: &[u8; 4]) -> Self {
        Self(i32::from_be_bytes(*code))
    }

    pub fn is_ok(self) -> bool {
        self == Self::NO_ERR
    }

    /// The four printable ASCII characters this status encodes, if any
    pub fn four_cc(self) -> Option<[u8; 4]> {
        let bytes = self.0.to_be_bytes();
        bytes
            .iter()
            .all(|b| (0x20..=0x7e).contains(b))
            .then_some(bytes)
    }
}

impl fmt::Display for OsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.four_cc() {
            Some(code) => {
                let text: String = code.iter().map(|&b| b as char).collect();
                write!(f, "'{}' ({})", text, self.0)
            }
            None => write!(f, "{}", self.0),
        }
    }
}

/// Structured record of one failed platform call
#[derive(Debug, Clone, Copy)]
pub struct StatusDiagnostic<'a> {
    pub status: OsStatus,
    pub operation: &'a str,
    pub file: &'static str,
    pub line: u32,
}

/// Error returned by [`StatusChecker::check_status`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed with status {status} at {file}:{line}")]
pub struct StatusError {
    pub status: OsStatus,
    pub operation: String,
    pub file: &'static str,
    pub line: u32,
}

impl StatusError {
    pub fn new(status: OsStatus, operation: impl Into<String>, file: &'static str, line: u32) -> Self {
        Self {
            status,
            operation: operation.into(),
            file,
            line,
        }
    }
}

/// Receives diagnostics for failed platform calls
///
/// Set a breakpoint in an implementation of `report` to stop on every
/// platform failure.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &StatusDiagnostic<'_>);
}

/// Default sink: logs each diagnostic through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &StatusDiagnostic<'_>) {
        tracing::error!(
            status = %diagnostic.status,
            operation = diagnostic.operation,
            file = diagnostic.file,
            line = diagnostic.line,
            "Platform audio call failed"
        );
    }
}

static GLOBAL_SINK: RwLock<Option<Arc<dyn DiagnosticSink>>> = RwLock::new(None);

/// Route diagnostics from every checker without its own sink to `sink`
pub fn install_diagnostic_sink(sink: Arc<dyn DiagnosticSink>) {
    *GLOBAL_SINK.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
}

/// Go back to logging diagnostics through [`TracingSink`]
pub fn reset_diagnostic_sink() {
    *GLOBAL_SINK.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Checks platform status codes and reports failures
#[derive(Clone, Default)]
pub struct StatusChecker {
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl StatusChecker {
    /// Checker that reports to the process-wide sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Checker that reports to `sink` instead of the process-wide sink
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Returns `true` when `status` is success. Otherwise reports a
    /// diagnostic attributed to `location` and returns `false`.
    pub fn check(&self, status: OsStatus, operation: &str, location: &Location<'static>) -> bool {
        if status.is_ok() {
            return true;
        }

        self.report(&StatusDiagnostic {
            status,
            operation,
            file: file_name(location.file()),
            line: location.line(),
        });
        false
    }

    /// Like [`check`](Self::check), attributed to the caller, returning an error
    /// that can be propagated with `?`.
    #[track_caller]
    pub fn check_status(&self, status: OsStatus, operation: &str) -> Result<(), StatusError> {
        let location = Location::caller();
        if self.check(status, operation, location) {
            Ok(())
        } else {
            Err(StatusError::new(
                status,
                operation,
                file_name(location.file()),
                location.line(),
            ))
        }
    }

    fn report(&self, diagnostic: &StatusDiagnostic<'_>) {
        if let Some(sink) = &self.sink {
            sink.report(diagnostic);
            return;
        }

        let global = GLOBAL_SINK
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match global {
            Some(sink) => sink.report(diagnostic),
            None => TracingSink.report(diagnostic),
        }
    }
}

/// Check `status` with the process-wide sink
#[track_caller]
pub fn check_status(status: OsStatus, operation: &str) -> Result<(), StatusError> {
    StatusChecker::new().check_status(status, operation)
}

fn file_name(path: &'static str) -> &'static str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
