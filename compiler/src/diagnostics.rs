//! Soft diagnostics.
//!
//! Warnings never abort compilation. They are returned as values next to the
//! result that produced them and mirrored to `tracing` so they also show up in
//! build logs.

use serde::Serialize;

pub const EXTRA_RPC_METHOD: &str = "extra-rpc-method";
pub const DUPLICATE_STEP_OVERRIDE: &str = "duplicate-step-override";
pub const DUPLICATE_ASPECT_OVERRIDE: &str = "duplicate-aspect-override";
pub const DUPLICATE_MODULE: &str = "duplicate-module";
pub const UNVERIFIED_SYNTHETIC_STEP: &str = "unverified-synthetic-step";
pub const ARTIFACT_WRITE_FAILED: &str = "artifact-write-failed";
pub const WIRE_STUB_UNAVAILABLE: &str = "wire-stub-unavailable";
pub const TOPOLOGY_STEP_UNMATCHED: &str = "topology-step-unmatched";
pub const TOPOLOGY_STEP_DUPLICATE: &str = "topology-step-duplicate";
pub const STEP_NOT_IN_TOPOLOGY: &str = "step-not-in-topology";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    /// Step, module, key or file the diagnostic is about
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, code: &'static str, subject: impl Into<String>, message: impl Into<String>) {
        let subject = subject.into();
        let message = message.into();
        tracing::warn!(code, subject = %subject, "{}", message);
        self.0.push(Diagnostic {
            severity: Severity::Warning,
            code,
            subject,
            message,
        });
    }

    pub fn info(&mut self, code: &'static str, subject: impl Into<String>, message: impl Into<String>) {
        let subject = subject.into();
        let message = message.into();
        tracing::info!(code, subject = %subject, "{}", message);
        self.0.push(Diagnostic {
            severity: Severity::Info,
            code,
            subject,
            message,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn warnings(&self) -> usize {
        self.0
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.0.iter().any(|d| d.code == code)
    }

    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.0.iter().filter(move |d| d.code == code)
    }
}

/// A successful result plus the soft diagnostics raised while producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Diagnostics,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with(value: T, diagnostics: Diagnostics) -> Self {
        Self { value, diagnostics }
    }

    /// Move the diagnostics into `sink` and return the value.
    pub fn drain_into(self, sink: &mut Diagnostics) -> T {
        sink.extend(self.diagnostics);
        self.value
    }
}
