use pipeworks_schema::SchemaError;
use serde::Serialize;
use thiserror::Error;

use crate::model::StreamingShape;

/// Which part of the input has to change to fix an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Consistency,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Step '{step}': {reason}")]
    Configuration { step: String, reason: String },

    #[error("Step '{step}': unknown step kind '{token}' (expected StepOneToOne, StepOneToMany, StepManyToOne or StepManyToMany)")]
    UnknownStepKind { step: String, token: String },

    #[error("Step '{step}': unknown deployment role '{token}'")]
    UnknownRole { step: String, token: String },

    #[error("Step '{step}': service name '{service}' must start with '{prefix}'")]
    InvalidServiceName {
        step: String,
        service: String,
        prefix: &'static str,
    },

    #[error("Only one orchestrator may be declared, found: {}", .0.join(", "))]
    MultipleOrchestrators(Vec<String>),

    #[error("Module configuration key '{key}': {reason}")]
    InvalidModuleConfig { key: String, reason: String },

    #[error("Schema resolution failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("Step '{step}': no service named '{service}' in the descriptor set{}", suggestion_suffix(.suggestions))]
    ServiceNotFound {
        step: String,
        service: String,
        suggestions: Vec<String>,
    },

    #[error("Step '{step}': service '{service}' is declared in more than one file: {}", .files.join(", "))]
    DuplicateService {
        step: String,
        service: String,
        files: Vec<String>,
    },

    #[error("Step '{step}': service '{service}' in {file} has no method '{method}'")]
    MethodNotFound {
        step: String,
        service: String,
        file: String,
        method: &'static str,
    },

    #[error("Step '{step}': service '{service}' in {file} declares method '{method}' {count} times")]
    DuplicateMethod {
        step: String,
        service: String,
        file: String,
        method: &'static str,
        count: usize,
    },

    #[error("Step '{step}': message type '{type_name}' is not declared by any schema file")]
    UnresolvedMessage { step: String, type_name: String },

    #[error("Step '{step}': declared streaming shape {declared} but {service}.{method} is {actual}")]
    StreamingMismatch {
        step: String,
        service: String,
        method: String,
        declared: StreamingShape,
        actual: StreamingShape,
    },
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(". Did you mean: {}?", suggestions.join(", "))
    }
}

impl CompileError {
    pub fn configuration(step: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::Configuration {
            step: step.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Configuration { .. }
            | CompileError::UnknownStepKind { .. }
            | CompileError::UnknownRole { .. }
            | CompileError::InvalidServiceName { .. }
            | CompileError::MultipleOrchestrators(_)
            | CompileError::InvalidModuleConfig { .. } => ErrorKind::Configuration,
            CompileError::Schema(_)
            | CompileError::ServiceNotFound { .. }
            | CompileError::DuplicateService { .. }
            | CompileError::MethodNotFound { .. }
            | CompileError::DuplicateMethod { .. }
            | CompileError::UnresolvedMessage { .. } => ErrorKind::Resolution,
            CompileError::StreamingMismatch { .. } => ErrorKind::Consistency,
        }
    }
}
