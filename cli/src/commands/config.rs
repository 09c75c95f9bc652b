use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::config::{InputsConfig, OutputConfig, PipeworksConfig, ProjectConfig};
use crate::ui;

/// Write a starter pipeworks.toml next to the usual input names.
pub fn init(config_path: &str, name: Option<String>) -> Result<()> {
    let path = Path::new(config_path);

    if path.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse a different path or remove the existing file.",
            path.display()
        );
    }

    ui::print_step("Initializing pipeworks project...");

    let project_name = name.unwrap_or_else(default_project_name);
    let config = PipeworksConfig {
        project: ProjectConfig {
            name: project_name,
        },
        inputs: InputsConfig {
            pipeline: Some("pipeline.toml".to_string()),
            descriptors: Some("target/descriptors.bin".to_string()),
            modules: None,
        },
        output: OutputConfig::default(),
    };
    config.validate()?;

    let config_toml = toml::to_string_pretty(&config)?;
    fs::write(path, &config_toml)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    ui::print_success(&format!("Created {}", path.display()));
    println!();
    println!("{}", "Next steps:".bold());
    println!(
        "  1. Produce a descriptor set: {}",
        "protoc --include_imports --descriptor_set_out=target/descriptors.bin ...".cyan()
    );
    println!("  2. Describe your steps in pipeline.toml");
    println!("  3. Compile: {}", "pw compile".cyan());

    Ok(())
}

fn default_project_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "pipeline".to_string())
}

pub fn validate(config_path: &str) -> Result<()> {
    ui::print_step("Validating configuration...");

    let config = PipeworksConfig::load(config_path)
        .context("Failed to load configuration. Run `pw init` to create a configuration file.")?;

    ui::print_success("Configuration is valid!");
    println!();
    println!("  Project: {}", config.project.name.bold());
    println!("  Output: {}", config.output.dir);

    let inputs = [
        ("pipeline", &config.inputs.pipeline),
        ("descriptors", &config.inputs.descriptors),
        ("modules", &config.inputs.modules),
    ];
    for (label, value) in inputs {
        match value {
            Some(v) => println!("  {} {}: {}", ui::symbols::BULLET.dimmed(), label, v),
            None => println!(
                "  {} {}: {}",
                ui::symbols::BULLET.dimmed(),
                label,
                "(not set)".dimmed()
            ),
        }
    }

    Ok(())
}
