use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Hidden,
    Info,
    Warning,
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticSeverity::Hidden => "hidden",
            DiagnosticSeverity::Info => "info",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Error => "error",
        };
        f.write_str(label)
    }
}

/// A single compiler or host diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// Zero-based line in the session document, when known
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            line: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "({}) {} {}: {}", line + 1, self.severity, self.code, self.message),
            None => write!(f, "{} {}: {}", self.severity, self.code, self.message),
        }
    }
}

/// Notification from the compiler engine that a session's diagnostics changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsUpdated {
    pub session_id: SessionId,
    /// Document version the diagnostics were computed against
    pub document_version: u64,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsUpdated {
    pub fn new(session_id: SessionId, document_version: u64, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            session_id,
            document_version,
            diagnostics,
        }
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

/// Per-session diagnostics callback, invoked on the delivering thread.
///
/// Runs while delivery to its session is held open, so it must not close
/// its own session.
pub type DiagnosticsCallback = Arc<dyn Fn(&DiagnosticsUpdated) + Send + Sync>;

/// Sender handed to the compiler engine.
pub type DiagnosticsSender = mpsc::UnboundedSender<DiagnosticsUpdated>;

/// Receiver drained by the diagnostics router.
pub type DiagnosticsReceiver = mpsc::UnboundedReceiver<DiagnosticsUpdated>;
