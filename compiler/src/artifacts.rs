//! Build artifacts read back by the runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostics, ARTIFACT_WRITE_FAILED};
use crate::model::OrchestratorBinding;
use crate::order::OrderExpansion;

pub const EXECUTION_ORDER_FILE: &str = "execution-order.json";
pub const TELEMETRY_BOUNDARY_FILE: &str = "telemetry-boundary.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOrderArtifact {
    pub order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryBoundaryArtifact {
    pub item_input_type: String,
    pub item_output_type: String,
    /// Step producing the pipeline's output item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_step: Option<String>,
    /// Step consuming the pipeline's input item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_step: Option<String>,
    #[serde(default)]
    pub side_effect_parents: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifacts {
    pub execution_order: ExecutionOrderArtifact,
    pub telemetry_boundary: TelemetryBoundaryArtifact,
}

/// Both artifacts, or nothing when there is no orchestrator.
pub fn build_artifacts(
    orchestrator: Option<&OrchestratorBinding>,
    base_order: &[String],
    expansion: &OrderExpansion,
) -> Option<Artifacts> {
    let orchestrator = orchestrator?;
    Some(Artifacts {
        execution_order: ExecutionOrderArtifact {
            order: expansion.order.clone(),
        },
        telemetry_boundary: TelemetryBoundaryArtifact {
            item_input_type: orchestrator.input_type.clone(),
            item_output_type: orchestrator.output_type.clone(),
            producer_step: base_order.last().cloned(),
            consumer_step: base_order.first().cloned(),
            side_effect_parents: expansion.side_effect_parents(),
        },
    })
}

/// Write both artifacts under `dir`.
///
/// Failures never abort the build; each one comes back as an
/// `artifact-write-failed` diagnostic.
pub fn write_artifacts(artifacts: &Artifacts, dir: &Path) -> (Vec<PathBuf>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut written = Vec::new();

    if let Err(e) = fs::create_dir_all(dir) {
        diagnostics.warn(
            ARTIFACT_WRITE_FAILED,
            dir.display().to_string(),
            format!("cannot create output directory: {}", e),
        );
        return (written, diagnostics);
    }

    let files = [
        (
            EXECUTION_ORDER_FILE,
            serde_json::to_string_pretty(&artifacts.execution_order),
        ),
        (
            TELEMETRY_BOUNDARY_FILE,
            serde_json::to_string_pretty(&artifacts.telemetry_boundary),
        ),
    ];

    for (name, rendered) in files {
        let path = dir.join(name);
        let result = rendered
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "wrote artifact");
                written.push(path);
            }
            Err(reason) => diagnostics.warn(
                ARTIFACT_WRITE_FAILED,
                path.display().to_string(),
                reason,
            ),
        }
    }

    (written, diagnostics)
}
