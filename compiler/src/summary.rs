//! One structured summary event per compile run.
//!
//! The driver fills the counters as passes finish; [`CompileSummary::emit`]
//! logs them as a single `compile_summary` event on the
//! `pipeworks::canonical` target, at `warn` when any step failed.

use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompileSummary {
    pub unit: String,
    pub transport: &'static str,
    /// `None` when the descriptor set did not resolve
    pub schema_files: Option<usize>,
    pub schema_passes: Option<usize>,
    pub steps_declared: usize,
    pub steps_compiled: usize,
    pub steps_failed: usize,
    pub synthetic_steps: usize,
    pub order_length: usize,
    pub orchestrator: bool,
    pub warnings: usize,
}

impl CompileSummary {
    pub fn new(unit: &str, transport: &'static str) -> Self {
        Self {
            unit: unit.to_string(),
            transport,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.steps_failed == 0
    }

    /// Log the summary; `started` is when the run began.
    pub fn emit(&self, started: Instant) {
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let summary = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());

        if self.is_clean() {
            tracing::info!(
                target: "pipeworks::canonical",
                unit = %self.unit,
                steps_compiled = self.steps_compiled,
                synthetic_steps = self.synthetic_steps,
                warnings = self.warnings,
                duration_ms,
                summary = %summary,
                "compile_summary"
            );
        } else {
            tracing::warn!(
                target: "pipeworks::canonical",
                unit = %self.unit,
                steps_compiled = self.steps_compiled,
                steps_failed = self.steps_failed,
                warnings = self.warnings,
                duration_ms,
                summary = %summary,
                "compile_summary"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_serializes_counters() {
        let mut summary = CompileSummary::new("orders", "GRPC");
        summary.steps_declared = 3;
        summary.steps_compiled = 2;
        summary.steps_failed = 1;
        assert!(!summary.is_clean());

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["unit"], "orders");
        assert_eq!(value["transport"], "GRPC");
        assert_eq!(value["steps_failed"], 1);
        assert!(value["schema_files"].is_null());
    }
}
