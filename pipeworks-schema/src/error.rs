//! Error types for descriptor loading and resolution

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Failed to read descriptor set {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to decode descriptor set {source_name}: {reason}")]
    Decode { source_name: String, reason: String },

    #[error("Schema file at position {0} has no name")]
    UnnamedFile(usize),

    #[error("Schema file '{0}' is declared more than once")]
    DuplicateFile(String),

    /// Some files never had all of their dependencies built.
    #[error(
        "Could not resolve schema files after {passes} passes: {} (missing or cyclic dependencies: {})",
        .files.join(", "),
        .missing.join(", ")
    )]
    Unresolved {
        files: Vec<String>,
        missing: Vec<String>,
        passes: usize,
    },

    #[error("{file}: method {service}.{method} references unknown message type '{type_name}'")]
    UnknownMessage {
        file: String,
        service: String,
        method: String,
        type_name: String,
    },
}
