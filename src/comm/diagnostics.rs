use crate::comm::util::truncate_with_ellipsis;
use crate::comm::warn::{self, WarnEvent};
#[cfg(test)]
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// One node or line could not be read; the rest of the batch continued.
    ParseSkip,
    /// A store read or write failed; in-memory state stayed authoritative.
    StorageSoftFail,
    /// A stored payload had the wrong shape and was treated as absent.
    MalformedConfig,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseSkip => "parse_skip",
            Self::StorageSoftFail => "storage_soft_fail",
            Self::MalformedConfig => "malformed_config",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub stage: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    pub fn parse_skip(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::ParseSkip, stage, detail)
    }

    pub fn storage(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::StorageSoftFail, stage, detail)
    }

    pub fn malformed(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::MalformedConfig, stage, detail)
    }
}

pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to stderr as `COMM_WARN` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarnSink;

impl DiagnosticSink for WarnSink {
    fn report(&self, diagnostic: Diagnostic) {
        let detail = truncate_with_ellipsis(&diagnostic.detail, 240);
        warn::emit(WarnEvent {
            code: diagnostic.kind.as_str(),
            stage: &diagnostic.stage,
            action: "continue",
            key: "na",
            reason: diagnostic.kind.as_str(),
            err: &detail,
        });
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: RefCell<Vec<Diagnostic>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }
}

#[cfg(test)]
impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.events.borrow_mut().push(diagnostic);
    }
}
