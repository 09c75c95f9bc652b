pub mod check;
pub mod compile;
pub mod config;
pub mod order;

use anyhow::Result;
use pipeworks_compiler::{compile as compile_unit, CompiledPipeline};

use crate::config::{resolve_inputs, InputOverrides, ResolvedInputs};
use crate::loader::load_unit;

/// Resolve inputs, load them and run the compiler.
///
/// Diagnostics from loading are merged into the pipeline's own.
pub(crate) fn run_pipeline(
    config_path: &str,
    overrides: InputOverrides,
) -> Result<(ResolvedInputs, CompiledPipeline)> {
    let inputs = resolve_inputs(config_path, overrides)?;
    let (unit, load_diagnostics) = load_unit(&inputs)?;
    let mut pipeline = compile_unit(&unit)?;

    let mut diagnostics = load_diagnostics;
    diagnostics.extend(std::mem::take(&mut pipeline.diagnostics));
    pipeline.diagnostics = diagnostics;

    Ok((inputs, pipeline))
}
