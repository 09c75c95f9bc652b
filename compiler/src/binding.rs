//! Binds a step model to its schema service and `remoteProcess` method.

use pipeworks_schema::{suggest_services, DescriptorPool};
use prost_types::FileDescriptorProto;

use crate::diagnostics::{Diagnostics, Outcome, EXTRA_RPC_METHOD};
use crate::error::CompileError;
use crate::model::{ServiceBinding, StepModel, StreamingShape};
use crate::naming::{REMOTE_METHOD, SERVICE_PREFIX};

pub fn resolve_binding(
    model: &StepModel,
    pool: &DescriptorPool,
) -> Result<Outcome<ServiceBinding>, CompileError> {
    if !model.service_name.starts_with(SERVICE_PREFIX) {
        return Err(CompileError::InvalidServiceName {
            step: model.name.clone(),
            service: model.service_name.clone(),
            prefix: SERVICE_PREFIX,
        });
    }

    let matches: Vec<_> = pool.services_named(&model.service_name).collect();
    let (file, service) = match matches.as_slice() {
        [] => {
            return Err(CompileError::ServiceNotFound {
                step: model.name.clone(),
                service: model.service_name.clone(),
                suggestions: suggest_services(pool, &model.service_name),
            })
        }
        [single] => *single,
        many => {
            return Err(CompileError::DuplicateService {
                step: model.name.clone(),
                service: model.service_name.clone(),
                files: many.iter().map(|(f, _)| f.name.clone()).collect(),
            })
        }
    };

    let candidates: Vec<_> = service.methods_named(REMOTE_METHOD).collect();
    let method = match candidates.as_slice() {
        [] => {
            return Err(CompileError::MethodNotFound {
                step: model.name.clone(),
                service: service.name.clone(),
                file: file.name.clone(),
                method: REMOTE_METHOD,
            })
        }
        [single] => *single,
        many => {
            return Err(CompileError::DuplicateMethod {
                step: model.name.clone(),
                service: service.name.clone(),
                file: file.name.clone(),
                method: REMOTE_METHOD,
                count: many.len(),
            })
        }
    };

    for type_name in [&method.input_type, &method.output_type] {
        if pool.message_owner(type_name).is_none() {
            return Err(CompileError::UnresolvedMessage {
                step: model.name.clone(),
                type_name: type_name.clone(),
            });
        }
    }

    let mut diagnostics = Diagnostics::new();
    let extra: Vec<&str> = service
        .methods
        .iter()
        .filter(|m| m.name != REMOTE_METHOD)
        .map(|m| m.name.as_str())
        .collect();
    if !extra.is_empty() {
        diagnostics.warn(
            EXTRA_RPC_METHOD,
            service.name.clone(),
            format!(
                "step '{}': only {} is bound, ignoring {}",
                model.name,
                REMOTE_METHOD,
                extra.join(", ")
            ),
        );
    }

    let actual = StreamingShape::of_method(method);
    if actual != model.streaming {
        return Err(CompileError::StreamingMismatch {
            step: model.name.clone(),
            service: service.name.clone(),
            method: method.name.clone(),
            declared: model.streaming,
            actual,
        });
    }

    tracing::debug!(
        step = %model.name,
        service = %service.full_name,
        file = %file.name,
        shape = %actual,
        "bound step to service"
    );

    Ok(Outcome::with(
        ServiceBinding {
            model: model.clone(),
            file: file.name.clone(),
            service: service.clone(),
            method: method.clone(),
        },
        diagnostics,
    ))
}

/// Build the descriptor pool from raw files, then bind.
pub fn resolve_binding_from_protos(
    model: &StepModel,
    protos: &[FileDescriptorProto],
) -> Result<Outcome<ServiceBinding>, CompileError> {
    let pool = DescriptorPool::build(protos)?;
    resolve_binding(model, &pool)
}
