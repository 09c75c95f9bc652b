//! Declared pipeline inputs, as handed to the compiler by the front end.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::model::{StepModel, StreamingShape, Transport};
use crate::naming;

/// One `[[steps]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDeclaration {
    pub name: String,
    pub service_name: Option<String>,
    pub namespace: Option<String>,
    pub input_type: Option<String>,
    pub input_converter: Option<String>,
    pub output_type: Option<String>,
    pub output_converter: Option<String>,
    /// `StepOneToOne`, `StepOneToMany`, `StepManyToOne` or `StepManyToMany`
    pub kind: Option<String>,
    pub grpc_enabled: Option<bool>,
    pub rest_enabled: Option<bool>,
    pub dedicated_worker_pool: Option<bool>,
    pub side_effect: bool,
    pub parent: Option<String>,
    pub role: Option<String>,
}

impl StepDeclaration {
    /// Fill in the namespace from the pipeline's base namespace when absent.
    pub fn with_default_namespace(&self, base_namespace: &str) -> Self {
        let mut decl = self.clone();
        if decl.namespace.as_deref().map_or(true, |ns| ns.trim().is_empty()) {
            decl.namespace = Some(base_namespace.to_string());
        }
        decl
    }
}

/// Attached configuration block for one step; set values win over the declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub grpc_enabled: Option<bool>,
    pub rest_enabled: Option<bool>,
    pub dedicated_worker_pool: Option<bool>,
    pub role: Option<String>,
}

/// One `[[topology]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyStep {
    pub name: String,
    #[serde(default)]
    pub input_type: String,
    #[serde(default)]
    pub output_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<String>,
}

impl TopologyStep {
    pub fn new(name: &str, input_type: &str, output_type: &str) -> Self {
        Self {
            name: name.to_string(),
            input_type: input_type.to_string(),
            output_type: output_type.to_string(),
            cardinality: None,
        }
    }

    pub fn with_cardinality(mut self, token: &str) -> Self {
        self.cardinality = Some(token.to_string());
        self
    }

    pub fn shape(&self) -> Result<StreamingShape, CompileError> {
        match self.cardinality.as_deref().map(str::trim) {
            None | Some("") => Ok(StreamingShape::UnaryUnary),
            Some(token) => {
                StreamingShape::parse_token(token).ok_or_else(|| CompileError::UnknownStepKind {
                    step: self.name.clone(),
                    token: token.to_string(),
                })
            }
        }
    }

    /// Index of the declared step this topology entry refers to.
    ///
    /// Exact normalized name matches win over token matches.
    pub fn match_model(&self, models: &[StepModel]) -> Option<usize> {
        self.match_unclaimed(models, &[])
    }

    /// Like [`match_model`](Self::match_model), but token matching prefers
    /// models whose index is not in `claimed`. A claimed model is only
    /// returned when nothing unclaimed shares a token with the name.
    pub fn match_unclaimed(&self, models: &[StepModel], claimed: &[usize]) -> Option<usize> {
        let wanted = naming::normalize_token(&self.name);
        let exact = models.iter().position(|m| {
            naming::normalize_token(&m.name) == wanted
                || naming::normalize_token(naming::step_base_name(&m.service_name)) == wanted
        });
        if exact.is_some() {
            return exact;
        }

        let open: Vec<usize> = (0..models.len()).filter(|i| !claimed.contains(i)).collect();
        let open_names: Vec<&str> = open.iter().map(|&i| models[i].name.as_str()).collect();
        naming::best_token_match(&self.name, &open_names)
            .map(|position| open[position])
            .or_else(|| {
                let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                naming::best_token_match(&self.name, &names)
            })
    }

    /// Streaming shape of this entry.
    ///
    /// A matched step's declared kind is authoritative; `cardinality` only
    /// describes unmatched entries, and contradicting the kind is an error.
    pub fn resolve_shape(&self, model: Option<&StepModel>) -> Result<StreamingShape, CompileError> {
        let Some(model) = model else {
            return self.shape();
        };
        if self.cardinality.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Ok(model.streaming);
        }
        let declared = self.shape()?;
        if declared != model.streaming {
            return Err(CompileError::configuration(
                &self.name,
                format!(
                    "topology cardinality {} contradicts step '{}' declared as {}",
                    declared, model.name, model.streaming
                ),
            ));
        }
        Ok(declared)
    }
}

/// Match every topology entry to a declared step, in order.
///
/// Each match claims its model so later token matches go to steps not yet
/// placed. Entries matching nothing are `None`.
pub fn match_topology(topology: &[TopologyStep], models: &[StepModel]) -> Vec<Option<usize>> {
    let mut claimed = Vec::new();
    topology
        .iter()
        .map(|step| {
            let index = step.match_unclaimed(models, &claimed);
            if let Some(index) = index {
                claimed.push(index);
            }
            index
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AspectScope {
    #[default]
    Global,
    Steps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AspectPosition {
    BeforeStep,
    #[default]
    AfterStep,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectConfig {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub scope: AspectScope,
    #[serde(default)]
    pub position: AspectPosition,
    #[serde(default)]
    pub target_steps: Vec<String>,
}

impl Default for AspectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: AspectScope::Global,
            position: AspectPosition::AfterStep,
            target_steps: Vec::new(),
        }
    }
}

impl AspectConfig {
    pub fn before() -> Self {
        Self {
            position: AspectPosition::BeforeStep,
            ..Self::default()
        }
    }

    pub fn targeting(mut self, steps: &[&str]) -> Self {
        self.scope = AspectScope::Steps;
        self.target_steps = steps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A `[[orchestrator]]` marker carrying CLI metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorMarker {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A whole pipeline description file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDescription {
    pub base_namespace: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub steps: Vec<StepDeclaration>,
    #[serde(default)]
    pub topology: Vec<TopologyStep>,
    #[serde(default)]
    pub aspects: BTreeMap<String, AspectConfig>,
    #[serde(default)]
    pub step_config: BTreeMap<String, StepConfig>,
    #[serde(default)]
    pub orchestrator: Vec<OrchestratorMarker>,
}

impl PipelineDescription {
    pub fn config_for(&self, step_name: &str) -> Option<&StepConfig> {
        self.step_config.get(step_name).or_else(|| {
            let wanted = naming::normalize_token(step_name);
            self.step_config
                .iter()
                .find(|(name, _)| naming::normalize_token(name) == wanted)
                .map(|(_, config)| config)
        })
    }
}
