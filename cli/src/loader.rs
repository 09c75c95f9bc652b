use anyhow::{Context, Result};
use pipeworks_compiler::{parse_client_config, ClientConfig, CompilationUnit, Diagnostics, PipelineDescription};
use pipeworks_schema::parse::parse_descriptor_set_file;
use std::fs;
use std::path::Path;

use crate::config::ResolvedInputs;

/// Read every input file into a compilation unit. Diagnostics raised while
/// parsing module overrides are returned next to it.
pub fn load_unit(inputs: &ResolvedInputs) -> Result<(CompilationUnit, Diagnostics)> {
    let description = load_pipeline(&inputs.pipeline)?;

    let descriptors = parse_descriptor_set_file(&inputs.descriptors)
        .with_context(|| format!("Failed to load descriptor set: {}", inputs.descriptors.display()))?
        .file;
    tracing::debug!(
        files = descriptors.len(),
        path = %inputs.descriptors.display(),
        "loaded descriptor set"
    );

    let mut diagnostics = Diagnostics::new();
    let client_config = match &inputs.modules {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read module overrides: {}", path.display()))?;
            parse_client_config(&text)
                .with_context(|| format!("Invalid module overrides: {}", path.display()))?
                .drain_into(&mut diagnostics)
        }
        None => ClientConfig::default(),
    };

    Ok((
        CompilationUnit {
            name: inputs.name.clone(),
            description,
            descriptors,
            client_config,
        },
        diagnostics,
    ))
}

fn load_pipeline(path: &Path) -> Result<PipelineDescription> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline description: {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse pipeline description: {}", path.display()))
}
