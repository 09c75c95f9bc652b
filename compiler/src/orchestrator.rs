//! Aggregate orchestrator entrypoint derived from the topology.

use std::collections::BTreeSet;

use crate::declaration::{match_topology, OrchestratorMarker, TopologyStep};
use crate::error::CompileError;
use crate::model::{
    CliMetadata, DeploymentRole, ExecutionMode, GenerationTarget, OrchestratorBinding, StepModel,
    StreamingShape, Transport, TypeMapping,
};
use crate::naming;

pub const ORCHESTRATOR_STEP: &str = "orchestrator";
pub const ORCHESTRATOR_SERVICE: &str = "OrchestratorService";

/// Build the orchestrator binding for an ordered topology.
///
/// Returns `Ok(None)` when the first input or last output type is blank; the
/// pipeline then simply has no orchestrator. Topology entries that match a
/// declared step take their streaming shape from that step's kind.
pub fn build_orchestrator_binding(
    topology: &[TopologyStep],
    base_namespace: &str,
    transport: Transport,
    markers: &[OrchestratorMarker],
    models: &[StepModel],
) -> Result<Option<OrchestratorBinding>, CompileError> {
    let (Some(first), Some(last)) = (topology.first(), topology.last()) else {
        return Err(CompileError::configuration(
            ORCHESTRATOR_STEP,
            "topology is empty",
        ));
    };
    let base_namespace = base_namespace.trim();
    if base_namespace.is_empty() {
        return Err(CompileError::configuration(
            ORCHESTRATOR_STEP,
            "base namespace is blank",
        ));
    }

    let cli = match markers {
        [] => None,
        [marker] => Some(CliMetadata {
            name: marker.name.clone(),
            description: marker.description.clone(),
            version: marker.version.clone(),
        }),
        many => {
            return Err(CompileError::MultipleOrchestrators(
                many.iter().map(|m| m.name.clone()).collect(),
            ))
        }
    };

    let input_type = first.input_type.trim();
    let output_type = last.output_type.trim();
    if input_type.is_empty() || output_type.is_empty() {
        tracing::debug!(
            first = %first.name,
            last = %last.name,
            "orchestrator skipped: boundary type is blank"
        );
        return Ok(None);
    }

    let matches = match_topology(topology, models);
    let mut shapes = Vec::with_capacity(topology.len());
    for (step, matched) in topology.iter().zip(&matches) {
        shapes.push(step.resolve_shape(matched.map(|index| &models[index]))?);
    }

    let first_step_shape = shapes[0];
    let input_streaming = first_step_shape.input_streaming();
    let output_streaming = shapes.iter().any(|shape| shape.output_streaming());

    let first_step_service = match matches[0] {
        Some(index) => models[index].service_name.clone(),
        None => naming::service_name_for_step(&first.name),
    };

    let mut targets = BTreeSet::new();
    targets.insert(match transport {
        Transport::Grpc => GenerationTarget::GrpcService,
        Transport::Rest => GenerationTarget::RestResource,
    });

    let entrypoint = StepModel {
        name: ORCHESTRATOR_STEP.to_string(),
        service_name: ORCHESTRATOR_SERVICE.to_string(),
        service_namespace: base_namespace.to_string(),
        qualified_service: naming::qualify(base_namespace, ORCHESTRATOR_SERVICE),
        input: TypeMapping::domain_only(input_type),
        output: TypeMapping::domain_only(output_type),
        streaming: StreamingShape::from_flags(input_streaming, output_streaming),
        targets,
        execution: ExecutionMode::Default,
        role: DeploymentRole::OrchestratorClient,
        side_effect: false,
        parent: None,
    };

    Ok(Some(OrchestratorBinding {
        entrypoint,
        base_namespace: base_namespace.to_string(),
        transport,
        input_type: input_type.to_string(),
        output_type: output_type.to_string(),
        input_streaming,
        output_streaming,
        first_step_service,
        first_step_shape,
        cli,
    }))
}
