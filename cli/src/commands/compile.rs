use anyhow::Result;
use colored::Colorize;
use pipeworks_compiler::{emit_all, CompiledPipeline};
use std::path::PathBuf;

use crate::config::InputOverrides;
use crate::plan::PlanEmitter;
use crate::ui;

/// Full run: compile, write the build artifacts and `plan.json`.
pub fn compile(config_path: &str, overrides: InputOverrides, json: bool) -> Result<()> {
    let (inputs, mut pipeline) = super::run_pipeline(config_path, overrides)?;

    let mut written = pipeline.write_artifacts(&inputs.output_dir);
    let mut emitter = PlanEmitter::new(&inputs.output_dir);
    let emitted = emit_all(&pipeline, &mut emitter)?;
    written.extend(emitter.written().cloned());
    tracing::debug!(emitted, files = written.len(), "compile outputs written");

    if json {
        println!("{}", serde_json::to_string_pretty(&pipeline)?);
        return Ok(());
    }

    print_summary(&pipeline, &written);
    Ok(())
}

fn print_summary(pipeline: &CompiledPipeline, written: &[PathBuf]) {
    ui::print_step(&format!("Compiled {}", pipeline.unit.bold()));

    print_steps(pipeline);
    ui::print_diagnostics(&pipeline.diagnostics);

    if !written.is_empty() {
        ui::print_section("Outputs");
        for path in written {
            println!("  {} {}", ui::symbols::BULLET.dimmed(), path.display());
        }
    }

    println!();
    if pipeline.is_success() {
        ui::print_success(&format!(
            "{} step(s) compiled, {} in execution order",
            pipeline.steps.len(),
            pipeline.order.len()
        ));
    } else {
        ui::print_warning(&format!(
            "{} step(s) compiled, {} failed",
            pipeline.steps.len(),
            pipeline.failures.len()
        ));
    }
}

/// Step and failure listing shared with `pw check`.
pub(crate) fn print_steps(pipeline: &CompiledPipeline) {
    ui::print_section("Steps");
    for step in &pipeline.steps {
        let schema = step
            .binding
            .as_ref()
            .map(|b| b.file.as_str())
            .unwrap_or("(rest only)");
        println!(
            "  {} {} {} ({}, {})",
            ui::symbols::SUCCESS.green(),
            step.model.name.bold(),
            step.model.qualified_service,
            step.model.streaming,
            schema.dimmed()
        );
    }
    for failure in &pipeline.failures {
        println!(
            "  {} {} {}",
            ui::symbols::FAILURE.red(),
            failure.step.bold(),
            failure.message.red()
        );
    }
}
