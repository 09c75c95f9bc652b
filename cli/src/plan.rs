//! `plan.json` writer: the resolved pipeline in one document.

use anyhow::{Context, Result};
use pipeworks_compiler::{
    CompiledPipeline, CompiledStep, Emitter, OrchestratorBinding, Placement, StreamingShape,
    WireTypes,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

pub const PLAN_FILE: &str = "plan.json";

#[derive(Debug, Serialize)]
struct PlannedStep {
    name: String,
    service: String,
    shape: StreamingShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wire_types: Option<WireTypes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placement: Option<Placement>,
}

#[derive(Debug, Serialize)]
struct Plan {
    unit: String,
    steps: Vec<PlannedStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orchestrator: Option<OrchestratorBinding>,
    order: Vec<String>,
}

/// Collects steps and writes them as `plan.json` on finish.
pub struct PlanEmitter {
    dir: PathBuf,
    steps: Vec<PlannedStep>,
    orchestrator: Option<(OrchestratorBinding, Vec<String>)>,
    written: Option<PathBuf>,
}

impl PlanEmitter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            steps: Vec::new(),
            orchestrator: None,
            written: None,
        }
    }

    pub fn written(&self) -> Option<&PathBuf> {
        self.written.as_ref()
    }
}

impl Emitter for PlanEmitter {
    type Error = anyhow::Error;

    fn emit_step(&mut self, step: &CompiledStep, placement: Option<&Placement>) -> Result<()> {
        self.steps.push(PlannedStep {
            name: step.model.name.clone(),
            service: step.model.qualified_service.clone(),
            shape: step.model.streaming,
            schema_file: step.binding.as_ref().map(|b| b.file.clone()),
            wire_types: step.wire_types.clone(),
            placement: placement.cloned(),
        });
        Ok(())
    }

    fn emit_orchestrator(&mut self, orchestrator: &OrchestratorBinding, order: &[String]) -> Result<()> {
        self.orchestrator = Some((orchestrator.clone(), order.to_vec()));
        Ok(())
    }

    fn finish(&mut self, pipeline: &CompiledPipeline) -> Result<()> {
        let (orchestrator, order) = match self.orchestrator.take() {
            Some((binding, order)) => (Some(binding), order),
            None => (None, pipeline.order.clone()),
        };
        let plan = Plan {
            unit: pipeline.unit.clone(),
            steps: std::mem::take(&mut self.steps),
            orchestrator,
            order,
        };

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;
        let path = self.dir.join(PLAN_FILE);
        let json = serde_json::to_string_pretty(&plan)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        self.written = Some(path);
        Ok(())
    }
}
