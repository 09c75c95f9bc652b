use anyhow::Result;
use pipeworks_compiler::{CompiledPipeline, StepFailure};
use serde::Serialize;

use crate::config::InputOverrides;
use crate::ui;

#[derive(Serialize)]
struct CheckReport<'a> {
    unit: &'a str,
    ok: bool,
    compiled: Vec<&'a str>,
    failures: &'a [StepFailure],
    warnings: usize,
}

impl<'a> CheckReport<'a> {
    fn new(pipeline: &'a CompiledPipeline) -> Self {
        Self {
            unit: &pipeline.unit,
            ok: pipeline.is_success(),
            compiled: pipeline.steps.iter().map(|s| s.model.name.as_str()).collect(),
            failures: &pipeline.failures,
            warnings: pipeline.diagnostics.warnings(),
        }
    }
}

/// Run resolution without writing anything. Returns whether every step compiled.
pub fn check(config_path: &str, overrides: InputOverrides, json: bool) -> Result<bool> {
    let (_, pipeline) = super::run_pipeline(config_path, overrides)?;
    let report = CheckReport::new(&pipeline);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.ok);
    }

    ui::print_step(&format!("Checking {}", pipeline.unit));
    super::compile::print_steps(&pipeline);
    ui::print_diagnostics(&pipeline.diagnostics);
    println!();

    if report.ok {
        ui::print_success(&format!("All {} step(s) resolved", report.compiled.len()));
    } else {
        ui::print_error(&format!(
            "{} of {} step(s) failed",
            report.failures.len(),
            report.failures.len() + report.compiled.len()
        ));
    }

    Ok(report.ok)
}
