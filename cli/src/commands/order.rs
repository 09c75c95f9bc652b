use anyhow::Result;
use colored::Colorize;
use pipeworks_compiler::CompiledPipeline;
use serde::Serialize;

use crate::config::InputOverrides;
use crate::ui;

#[derive(Serialize)]
struct OrderEntry<'a> {
    step: &'a str,
    synthetic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

fn entries(pipeline: &CompiledPipeline) -> Vec<OrderEntry<'_>> {
    pipeline
        .order
        .iter()
        .map(|step| {
            let placement = pipeline.placement(step);
            OrderEntry {
                step,
                synthetic: pipeline.synthetic.iter().any(|s| &s.identifier == step),
                module: placement.map(|p| p.module.as_str()),
                address: placement.map(|p| format!("{}:{}", p.host, p.port)),
            }
        })
        .collect()
}

/// Print the expanded execution order with synthetic steps marked.
pub fn order(config_path: &str, overrides: InputOverrides, json: bool) -> Result<()> {
    let (_, pipeline) = super::run_pipeline(config_path, overrides)?;
    let entries = entries(&pipeline);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        ui::print_warning("Execution order is empty (no topology or no matched steps)");
        ui::print_diagnostics(&pipeline.diagnostics);
        return Ok(());
    }

    ui::print_section(&format!("Execution order ({})", entries.len()));
    for (i, entry) in entries.iter().enumerate() {
        let marker = if entry.synthetic {
            ui::symbols::PLUS.green().bold()
        } else {
            ui::symbols::BULLET.dimmed()
        };
        let location = match (entry.module, &entry.address) {
            (Some(module), Some(address)) => format!("{} @ {}", module, address),
            _ => String::new(),
        };
        println!(
            "  {:>2}. {} {} {}",
            i + 1,
            marker,
            entry.step,
            location.dimmed()
        );
    }
    ui::print_diagnostics(&pipeline.diagnostics);

    Ok(())
}
