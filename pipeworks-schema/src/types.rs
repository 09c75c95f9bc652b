//! Resolved schema definitions
//!
//! These mirror the parts of a protobuf `FileDescriptorProto` the pipeline
//! compiler needs, with every type name kept fully qualified (leading `.`).

use prost_types::{DescriptorProto, FileDescriptorProto};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::utils::derive_outer_container;

/// Language naming options declared on a schema file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNaming {
    /// Explicit package for generated code (`java_package`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_override: Option<String>,
    /// One generated file per message (`java_multiple_files`).
    #[serde(default)]
    pub multiple_files: bool,
    /// Explicit outer container name (`java_outer_classname`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_container_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    /// Fully qualified request message, e.g. `.acme.customer.CustomerIn`
    pub input_type: String,
    /// Fully qualified response message
    pub output_type: String,
    #[serde(default)]
    pub client_streaming: bool,
    #[serde(default)]
    pub server_streaming: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    /// `package.Name`, without a leading dot
    pub full_name: String,
    pub methods: Vec<MethodDef>,
}

impl ServiceDef {
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    pub name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub naming: FileNaming,
    /// Every message declared in this file, nested ones included.
    #[serde(default)]
    pub messages: Vec<String>,
    /// Top-level enum names
    #[serde(default)]
    pub enums: Vec<String>,
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

impl SchemaFile {
    pub fn from_proto(position: usize, proto: &FileDescriptorProto) -> Result<Self, SchemaError> {
        let name = proto.name();
        if name.trim().is_empty() {
            return Err(SchemaError::UnnamedFile(position));
        }

        let package = proto.package().to_string();
        let scope = qualify(".", &package);

        let mut messages = Vec::new();
        for message in &proto.message_type {
            collect_messages(&scope, message, &mut messages);
        }

        let services = proto
            .service
            .iter()
            .map(|service| ServiceDef {
                name: service.name().to_string(),
                full_name: if package.is_empty() {
                    service.name().to_string()
                } else {
                    format!("{}.{}", package, service.name())
                },
                methods: service
                    .method
                    .iter()
                    .map(|method| MethodDef {
                        name: method.name().to_string(),
                        input_type: absolute_type_name(&package, method.input_type()),
                        output_type: absolute_type_name(&package, method.output_type()),
                        client_streaming: method.client_streaming(),
                        server_streaming: method.server_streaming(),
                    })
                    .collect(),
            })
            .collect();

        let naming = proto
            .options
            .as_ref()
            .map(|options| FileNaming {
                package_override: options.java_package.clone().filter(|p| !p.is_empty()),
                multiple_files: options.java_multiple_files(),
                outer_container_override: options
                    .java_outer_classname
                    .clone()
                    .filter(|o| !o.is_empty()),
            })
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            package,
            dependencies: proto.dependency.clone(),
            naming,
            messages,
            enums: proto.enum_type.iter().map(|e| e.name().to_string()).collect(),
            services,
        })
    }

    /// Package generated code lives in: the explicit override, else the schema package.
    pub fn code_package(&self) -> &str {
        self.naming
            .package_override
            .as_deref()
            .unwrap_or(self.package.as_str())
    }

    /// Name of the container that wraps this file's generated types.
    pub fn outer_container(&self) -> String {
        if let Some(explicit) = &self.naming.outer_container_override {
            return explicit.clone();
        }
        let top_level: Vec<&str> = self
            .messages
            .iter()
            .filter_map(|fq| self.relative_name(fq))
            .filter(|relative| !relative.contains('.'))
            .chain(self.enums.iter().map(String::as_str))
            .chain(self.services.iter().map(|s| s.name.as_str()))
            .collect();
        derive_outer_container(&self.name, &top_level)
    }

    /// Strip this file's package scope from a fully qualified type name.
    pub fn relative_name<'a>(&self, fq_name: &'a str) -> Option<&'a str> {
        let trimmed = fq_name.strip_prefix('.').unwrap_or(fq_name);
        if self.package.is_empty() {
            return Some(trimmed);
        }
        trimmed
            .strip_prefix(self.package.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
    }

    pub fn declares_message(&self, fq_name: &str) -> bool {
        self.messages.iter().any(|m| m == fq_name)
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if name.is_empty() {
        scope.to_string()
    } else if scope == "." {
        format!(".{}", name)
    } else {
        format!("{}.{}", scope, name)
    }
}

fn collect_messages(scope: &str, message: &DescriptorProto, out: &mut Vec<String>) {
    let fq = qualify(scope, message.name());
    for nested in &message.nested_type {
        collect_messages(&fq, nested, out);
    }
    out.push(fq);
}

/// Descriptor sets emitted by `protoc` always carry absolute names; hand-built
/// ones sometimes do not, so relative names are anchored at the file package.
fn absolute_type_name(package: &str, type_name: &str) -> String {
    if type_name.starts_with('.') || type_name.is_empty() {
        type_name.to_string()
    } else if package.is_empty() {
        format!(".{}", type_name)
    } else {
        format!(".{}.{}", package, type_name)
    }
}
