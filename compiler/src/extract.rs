//! Step model extraction.

use std::collections::BTreeSet;

use crate::declaration::{StepConfig, StepDeclaration};
use crate::error::CompileError;
use crate::model::{
    DeploymentRole, ExecutionMode, GenerationTarget, StepModel, StreamingShape, TypeMapping,
};
use crate::naming;

/// Build the model for one declared step. Values set in `config` override the
/// declaration.
pub fn extract_step(
    decl: &StepDeclaration,
    config: Option<&StepConfig>,
) -> Result<StepModel, CompileError> {
    let name = decl.name.trim();
    if name.is_empty() {
        return Err(CompileError::configuration("<unnamed>", "step name is empty"));
    }

    let service_name = match decl.service_name.as_deref().map(str::trim) {
        Some(explicit) if !explicit.is_empty() => explicit.to_string(),
        _ => naming::service_name_for_step(name),
    };

    let namespace = decl
        .namespace
        .as_deref()
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| CompileError::configuration(name, "no namespace declared"))?
        .to_string();

    let streaming = match decl.kind.as_deref().map(str::trim) {
        None | Some("") => StreamingShape::UnaryUnary,
        Some(token) => {
            StreamingShape::parse_token(token).ok_or_else(|| CompileError::UnknownStepKind {
                step: name.to_string(),
                token: token.to_string(),
            })?
        }
    };

    let grpc_enabled = config
        .and_then(|c| c.grpc_enabled)
        .or(decl.grpc_enabled)
        .unwrap_or(true);
    let rest_enabled = config
        .and_then(|c| c.rest_enabled)
        .or(decl.rest_enabled)
        .unwrap_or(false);
    let dedicated = config
        .and_then(|c| c.dedicated_worker_pool)
        .or(decl.dedicated_worker_pool)
        .unwrap_or(false);

    let mut targets = BTreeSet::new();
    if grpc_enabled {
        targets.insert(GenerationTarget::GrpcService);
        targets.insert(GenerationTarget::ClientStep);
    }
    if rest_enabled {
        targets.insert(GenerationTarget::RestResource);
    }
    if targets.is_empty() {
        return Err(CompileError::configuration(
            name,
            "neither gRPC nor REST generation is enabled",
        ));
    }

    let role_token = config
        .and_then(|c| c.role.as_deref())
        .or(decl.role.as_deref())
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let role = match role_token {
        Some(token) => DeploymentRole::parse_token(token).ok_or_else(|| CompileError::UnknownRole {
            step: name.to_string(),
            token: token.to_string(),
        })?,
        None if decl.side_effect => DeploymentRole::PluginServer,
        None if !grpc_enabled => DeploymentRole::RestServer,
        None => DeploymentRole::PipelineServer,
    };

    let parent = decl
        .parent
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    if parent.is_some() && !decl.side_effect {
        return Err(CompileError::configuration(
            name,
            "only side-effect steps may declare a parent",
        ));
    }

    let model = StepModel {
        name: name.to_string(),
        qualified_service: naming::qualify(&namespace, &service_name),
        service_name,
        service_namespace: namespace,
        input: TypeMapping::from_declared(decl.input_type.as_deref(), decl.input_converter.as_deref()),
        output: TypeMapping::from_declared(
            decl.output_type.as_deref(),
            decl.output_converter.as_deref(),
        ),
        streaming,
        targets,
        execution: if dedicated {
            ExecutionMode::WorkerPool
        } else {
            ExecutionMode::Default
        },
        role,
        side_effect: decl.side_effect,
        parent,
    };

    tracing::debug!(
        step = %model.name,
        service = %model.qualified_service,
        streaming = %model.streaming,
        "extracted step model"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str) -> StepDeclaration {
        StepDeclaration {
            name: name.to_string(),
            namespace: Some("acme".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let model = extract_step(&decl("validate-order"), None).unwrap();
        assert_eq!(model.service_name, "ProcessValidateOrderService");
        assert_eq!(model.qualified_service, "acme.ProcessValidateOrderService");
        assert_eq!(model.streaming, StreamingShape::UnaryUnary);
        assert!(model.has_target(GenerationTarget::GrpcService));
        assert!(model.has_target(GenerationTarget::ClientStep));
        assert!(!model.has_target(GenerationTarget::RestResource));
        assert_eq!(model.execution, ExecutionMode::Default);
        assert_eq!(model.role, DeploymentRole::PipelineServer);
        assert_eq!(model.input, TypeMapping::disabled());
    }

    #[test]
    fn test_kind_token_sets_shape() {
        let mut d = decl("split");
        d.kind = Some("StepOneToMany".to_string());
        assert_eq!(
            extract_step(&d, None).unwrap().streaming,
            StreamingShape::UnaryStreaming
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut d = decl("split");
        d.kind = Some("StepSideways".to_string());
        let err = extract_step(&d, None).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownStepKind {
                step: "split".to_string(),
                token: "StepSideways".to_string()
            }
        );
    }

    #[test]
    fn test_config_overrides_declaration() {
        let mut d = decl("export");
        d.rest_enabled = Some(false);
        let config = StepConfig {
            grpc_enabled: Some(false),
            rest_enabled: Some(true),
            dedicated_worker_pool: Some(true),
            role: None,
        };
        let model = extract_step(&d, Some(&config)).unwrap();
        assert!(!model.has_target(GenerationTarget::GrpcService));
        assert!(model.has_target(GenerationTarget::RestResource));
        assert_eq!(model.execution, ExecutionMode::WorkerPool);
        assert_eq!(model.role, DeploymentRole::RestServer);
    }

    #[test]
    fn test_type_mappings() {
        let mut d = decl("enrich");
        d.input_type = Some("acme.Customer".to_string());
        d.input_converter = Some("acme.CustomerMapper".to_string());
        d.output_type = Some("acme.Profile".to_string());
        let model = extract_step(&d, None).unwrap();
        assert!(model.input.enabled);
        assert_eq!(model.declared_output_type(), Some("acme.Profile"));
        assert!(!model.output.enabled);
    }

    #[test]
    fn test_side_effect_defaults_to_plugin() {
        let mut d = decl("audit");
        d.side_effect = true;
        d.parent = Some("validate-order".to_string());
        let model = extract_step(&d, None).unwrap();
        assert_eq!(model.role, DeploymentRole::PluginServer);
        assert_eq!(model.parent.as_deref(), Some("validate-order"));
    }

    #[test]
    fn test_configuration_errors_name_the_step() {
        let mut d = decl("orphan");
        d.parent = Some("x".to_string());
        let err = extract_step(&d, None).unwrap_err();
        assert!(err.to_string().contains("'orphan'"));

        let mut d = decl("nowhere");
        d.grpc_enabled = Some(false);
        assert!(extract_step(&d, None).is_err());

        let mut d = decl("nons");
        d.namespace = None;
        assert!(extract_step(&d, None).unwrap_err().to_string().contains("'nons'"));

        let mut d = decl("badrole");
        d.role = Some("janitor".to_string());
        assert!(matches!(
            extract_step(&d, None).unwrap_err(),
            CompileError::UnknownRole { .. }
        ));
    }
}
