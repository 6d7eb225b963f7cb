//! Per-entity error and warning accumulation.
//!
//! Builders never fail outright. Every problem they run into is recorded
//! here together with the payload fragment that caused it, and the caller
//! inspects the sink after construction. A hard failure additionally marks
//! the sink as aborted, which makes the owning entity unusable for
//! persistence.

use serde::Serialize;
use serde_json::Value;

/// A single recorded problem: a human-readable message plus the offending
/// payload fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub payload: Value,
}

/// Ordered errors and warnings for one entity, plus the abort flag.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    aborted: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>, payload: Value) {
        self.errors.push(Diagnostic {
            message: message.into(),
            payload,
        });
    }

    pub fn add_warning(&mut self, message: impl Into<String>, payload: Value) {
        self.warnings.push(Diagnostic {
            message: message.into(),
            payload,
        });
    }

    /// Record an error and mark the entity as aborted.
    ///
    /// This is the only way to set the abort flag, so an aborted sink always
    /// carries at least one error.
    pub fn abort(&mut self, message: impl Into<String>, payload: Value) {
        self.add_error(message, payload);
        self.aborted = true;
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    /// The first recorded error, which for an aborted entity is the cause.
    pub fn abort_reason(&self) -> Option<&str> {
        if !self.aborted {
            return None;
        }
        self.errors.first().map(|d| d.message.as_str())
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }

    /// Drop both errors and warnings. The abort flag survives.
    pub fn clear(&mut self) {
        self.clear_errors();
        self.clear_warnings();
    }
}
