//! Compilation driver.
//!
//! Runs every pass over one compilation unit. Step-level failures are
//! isolated: a step that fails extraction or binding is recorded in
//! [`CompiledPipeline::failures`] and the remaining steps still compile.

use pipeworks_schema::{DescriptorPool, SchemaError};
use prost_types::FileDescriptorProto;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifacts::{build_artifacts, write_artifacts, Artifacts};
use crate::binding::resolve_binding;
use crate::declaration::PipelineDescription;
use crate::diagnostics::Diagnostics;
use crate::error::{CompileError, ErrorKind};
use crate::extract::extract_step;
use crate::model::{GenerationTarget, OrchestratorBinding, ServiceBinding, StepModel, Transport};
use crate::orchestrator::build_orchestrator_binding;
use crate::order::{derive_base_order, OrderExpander, StepContracts, SymbolResolver, SyntheticStep};
use crate::placement::{resolve_placements, ClientConfig, Placement};
use crate::summary::CompileSummary;
use crate::wire_types::{resolve_wire_types, WireTypes};

/// Everything one compile run reads.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    pub name: String,
    pub description: PipelineDescription,
    pub descriptors: Vec<FileDescriptorProto>,
    pub client_config: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledStep {
    pub model: StepModel,
    /// Absent for steps that only generate REST resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<ServiceBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire_types: Option<WireTypes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip)]
    pub error: CompileError,
}

impl StepFailure {
    fn new(step: &str, error: CompileError) -> Self {
        tracing::warn!(step, kind = ?error.kind(), "{}", error);
        Self {
            step: step.to_string(),
            kind: error.kind(),
            message: error.to_string(),
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledPipeline {
    pub unit: String,
    pub transport: Transport,
    pub steps: Vec<CompiledStep>,
    pub failures: Vec<StepFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<OrchestratorBinding>,
    pub base_order: Vec<String>,
    pub order: Vec<String>,
    pub synthetic: Vec<SyntheticStep>,
    pub placements: Vec<Placement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,
    pub diagnostics: Diagnostics,
}

impl CompiledPipeline {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn step(&self, name: &str) -> Option<&CompiledStep> {
        self.steps.iter().find(|s| s.model.name == name)
    }

    pub fn failure(&self, name: &str) -> Option<&StepFailure> {
        self.failures.iter().find(|f| f.step == name)
    }

    pub fn placement(&self, identifier: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.step == identifier)
    }

    /// Write the build artifacts, if any. Write failures are added to the
    /// pipeline's diagnostics instead of being returned.
    pub fn write_artifacts(&mut self, dir: &Path) -> Vec<PathBuf> {
        let Some(artifacts) = &self.artifacts else {
            tracing::debug!("no orchestrator, skipping artifacts");
            return Vec::new();
        };
        let (written, diagnostics) = write_artifacts(artifacts, dir);
        self.diagnostics.extend(diagnostics);
        written
    }
}

pub fn compile(unit: &CompilationUnit) -> Result<CompiledPipeline, CompileError> {
    compile_with_resolver(unit, None)
}

/// Compile with an optional resolver that verifies synthetic identifiers.
///
/// Only unit-level problems return `Err`: orchestrator markers, the base
/// namespace, topology cardinalities (unknown, or contradicting a step's
/// kind) and a base port with no room for default ports.
pub fn compile_with_resolver(
    unit: &CompilationUnit,
    resolver: Option<&dyn SymbolResolver>,
) -> Result<CompiledPipeline, CompileError> {
    let description = &unit.description;
    let transport = description.transport;
    let started = Instant::now();
    let mut summary = CompileSummary::new(&unit.name, transport.name());

    let mut diagnostics = Diagnostics::new();
    let mut failures = Vec::new();
    let mut models = Vec::new();

    for decl in &description.steps {
        let decl = decl.with_default_namespace(&description.base_namespace);
        match extract_step(&decl, description.config_for(&decl.name)) {
            Ok(model) => models.push(model),
            Err(e) => failures.push(StepFailure::new(&decl.name, e)),
        }
    }

    let pool: Result<DescriptorPool, SchemaError> = DescriptorPool::build(&unit.descriptors);
    match &pool {
        Ok(pool) => {
            summary.schema_files = Some(pool.files().len());
            summary.schema_passes = Some(pool.passes());
        }
        Err(e) => tracing::warn!(error = %e, "descriptor set did not resolve"),
    }

    let mut steps = Vec::new();
    for model in &models {
        if !model.has_target(GenerationTarget::GrpcService) {
            steps.push(CompiledStep {
                model: model.clone(),
                binding: None,
                wire_types: None,
            });
            continue;
        }
        let pool = match &pool {
            Ok(pool) => pool,
            Err(e) => {
                failures.push(StepFailure::new(&model.name, e.clone().into()));
                continue;
            }
        };
        match resolve_binding(model, pool) {
            Ok(outcome) => {
                let binding = outcome.drain_into(&mut diagnostics);
                let wire = resolve_wire_types(&binding, pool).drain_into(&mut diagnostics);
                steps.push(CompiledStep {
                    model: model.clone(),
                    binding: Some(binding),
                    wire_types: Some(wire),
                });
            }
            Err(e) => failures.push(StepFailure::new(&model.name, e)),
        }
    }

    let orchestrator = if description.topology.is_empty() {
        if description.orchestrator.len() > 1 {
            return Err(CompileError::MultipleOrchestrators(
                description.orchestrator.iter().map(|m| m.name.clone()).collect(),
            ));
        }
        None
    } else {
        build_orchestrator_binding(
            &description.topology,
            &description.base_namespace,
            transport,
            &description.orchestrator,
            &models,
        )?
    };

    let base_order =
        derive_base_order(&description.topology, &models, transport).drain_into(&mut diagnostics);
    let contracts = StepContracts::from_models(&models, transport);
    let mut expander = OrderExpander::new(
        &description.aspects,
        &contracts,
        &description.topology,
        &description.base_namespace,
        transport,
    );
    if let Some(resolver) = resolver {
        expander = expander.with_resolver(resolver);
    }
    let expansion = expander.expand(&base_order).drain_into(&mut diagnostics);
    let placements = resolve_placements(&expansion, &models, transport, &unit.client_config)?;
    let artifacts = build_artifacts(orchestrator.as_ref(), &base_order, &expansion);

    summary.steps_declared = description.steps.len();
    summary.steps_compiled = steps.len();
    summary.steps_failed = failures.len();
    summary.synthetic_steps = expansion.synthetic.len();
    summary.order_length = expansion.order.len();
    summary.orchestrator = orchestrator.is_some();
    summary.warnings = diagnostics.warnings();
    summary.emit(started);

    Ok(CompiledPipeline {
        unit: unit.name.clone(),
        transport,
        steps,
        failures,
        orchestrator,
        base_order,
        order: expansion.order,
        synthetic: expansion.synthetic,
        placements,
        artifacts,
        diagnostics,
    })
}
