//! Generated-code identifiers for a bound service.

use pipeworks_schema::{DescriptorPool, SchemaFile};
use serde::Serialize;

use crate::diagnostics::{Diagnostics, Outcome, WIRE_STUB_UNAVAILABLE};
use crate::model::ServiceBinding;
use crate::naming;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireTypes {
    pub request_type: String,
    pub response_type: String,
    /// Client stub, e.g. `com.acme.ProcessCustomerServiceGrpc.ProcessCustomerServiceStub`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impl_base: Option<String>,
    /// Outer container holding the service file's descriptor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor_holder: Option<String>,
}

/// Request and response types always resolve. Stub identifiers need the
/// service file and its package; without them they are left out and a
/// `wire-stub-unavailable` diagnostic is returned instead.
pub fn resolve_wire_types(binding: &ServiceBinding, pool: &DescriptorPool) -> Outcome<WireTypes> {
    let mut diagnostics = Diagnostics::new();
    let request_type = message_type(pool, &binding.method.input_type);
    let response_type = message_type(pool, &binding.method.output_type);

    let service_file = pool
        .file(&binding.file)
        .filter(|file| !file.code_package().is_empty());

    let (stub, impl_base, descriptor_holder) = match service_file {
        Some(file) => {
            let package = file.code_package();
            let grpc = format!("{}Grpc", binding.service.name);
            (
                Some(format!("{}.{}.{}Stub", package, grpc, binding.service.name)),
                Some(format!("{}.{}.{}ImplBase", package, grpc, binding.service.name)),
                Some(naming::qualify(package, &file.outer_container())),
            )
        }
        None => {
            diagnostics.info(
                WIRE_STUB_UNAVAILABLE,
                binding.model.name.clone(),
                format!(
                    "no package information for '{}', stub identifiers omitted",
                    binding.file
                ),
            );
            (None, None, None)
        }
    };

    Outcome::with(
        WireTypes {
            request_type,
            response_type,
            stub,
            impl_base,
            descriptor_holder,
        },
        diagnostics,
    )
}

fn message_type(pool: &DescriptorPool, fq_name: &str) -> String {
    match pool.message_owner(fq_name) {
        Some(owner) => generated_type(owner, fq_name),
        None => fq_name.trim_start_matches('.').to_string(),
    }
}

/// One file per type puts messages straight in the package; otherwise they
/// are nested in the file's outer container.
fn generated_type(owner: &SchemaFile, fq_name: &str) -> String {
    let relative = owner
        .relative_name(fq_name)
        .unwrap_or_else(|| fq_name.trim_start_matches('.'));
    let package = owner.code_package();
    if owner.naming.multiple_files {
        naming::qualify(package, relative)
    } else {
        naming::qualify(package, &format!("{}.{}", owner.outer_container(), relative))
    }
}
