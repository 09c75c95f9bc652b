//! Semantic IR produced by the resolution passes and consumed by emitters.

use pipeworks_schema::{MethodDef, ServiceDef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::naming;

/// Cardinality of a step's input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamingShape {
    #[default]
    UnaryUnary,
    StreamingUnary,
    UnaryStreaming,
    StreamingStreaming,
}

impl StreamingShape {
    pub const ALL: [StreamingShape; 4] = [
        StreamingShape::UnaryUnary,
        StreamingShape::StreamingUnary,
        StreamingShape::UnaryStreaming,
        StreamingShape::StreamingStreaming,
    ];

    pub fn from_flags(client_streaming: bool, server_streaming: bool) -> Self {
        match (client_streaming, server_streaming) {
            (false, false) => StreamingShape::UnaryUnary,
            (true, false) => StreamingShape::StreamingUnary,
            (false, true) => StreamingShape::UnaryStreaming,
            (true, true) => StreamingShape::StreamingStreaming,
        }
    }

    pub fn of_method(method: &MethodDef) -> Self {
        Self::from_flags(method.client_streaming, method.server_streaming)
    }

    pub fn input_streaming(self) -> bool {
        matches!(
            self,
            StreamingShape::StreamingUnary | StreamingShape::StreamingStreaming
        )
    }

    pub fn output_streaming(self) -> bool {
        matches!(
            self,
            StreamingShape::UnaryStreaming | StreamingShape::StreamingStreaming
        )
    }

    /// Parse a step-kind or cardinality token.
    ///
    /// Matching ignores case and punctuation, so `StepOneToMany`,
    /// `one_to_many` and `ONE-TO-MANY` are the same token.
    pub fn parse_token(token: &str) -> Option<Self> {
        let normalized = naming::normalize_token(token);
        let bare = normalized.strip_prefix("step").unwrap_or(&normalized);
        match bare {
            "onetoone" | "unaryunary" => Some(StreamingShape::UnaryUnary),
            "manytoone" | "reduction" | "streamingunary" => Some(StreamingShape::StreamingUnary),
            "onetomany" | "expansion" | "unarystreaming" => Some(StreamingShape::UnaryStreaming),
            "manytomany" | "streamingstreaming" => Some(StreamingShape::StreamingStreaming),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StreamingShape::UnaryUnary => "unary→unary",
            StreamingShape::StreamingUnary => "streaming→unary",
            StreamingShape::UnaryStreaming => "unary→streaming",
            StreamingShape::StreamingStreaming => "streaming→streaming",
        }
    }
}

impl fmt::Display for StreamingShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Adapter kinds emitters may generate for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationTarget {
    GrpcService,
    ClientStep,
    RestResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    #[default]
    Default,
    /// Runs on a dedicated worker pool instead of the event loop.
    WorkerPool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentRole {
    #[default]
    PipelineServer,
    OrchestratorClient,
    PluginServer,
    PluginClient,
    RestServer,
}

impl DeploymentRole {
    pub fn parse_token(token: &str) -> Option<Self> {
        match naming::normalize_token(token).as_str() {
            "pipelineserver" | "server" => Some(DeploymentRole::PipelineServer),
            "orchestratorclient" | "orchestrator" => Some(DeploymentRole::OrchestratorClient),
            "pluginserver" | "plugin" => Some(DeploymentRole::PluginServer),
            "pluginclient" => Some(DeploymentRole::PluginClient),
            "restserver" | "rest" => Some(DeploymentRole::RestServer),
            _ => None,
        }
    }
}

/// Transport the orchestrator uses to call steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transport {
    #[default]
    #[serde(rename = "GRPC", alias = "grpc")]
    Grpc,
    #[serde(rename = "REST", alias = "rest", alias = "HTTP", alias = "http")]
    Rest,
}

impl Transport {
    /// Suffix of the client adapter generated for a step.
    pub fn adapter_suffix(self) -> &'static str {
        match self {
            Transport::Grpc => "GrpcClientStep",
            Transport::Rest => "RestClientStep",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transport::Grpc => "GRPC",
            Transport::Rest => "REST",
        }
    }
}

/// How a wire-level type converts to and from an internal domain type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converter: Option<String>,
    pub enabled: bool,
}

impl TypeMapping {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Domain type known, but no converter declared.
    pub fn domain_only(domain_type: impl Into<String>) -> Self {
        Self {
            domain_type: Some(domain_type.into()),
            converter: None,
            enabled: false,
        }
    }

    pub fn converted(domain_type: impl Into<String>, converter: impl Into<String>) -> Self {
        Self {
            domain_type: Some(domain_type.into()),
            converter: Some(converter.into()),
            enabled: true,
        }
    }

    /// Absent or void types mean no mapping; an absent or void converter
    /// leaves the mapping disabled with the domain type only.
    pub fn from_declared(domain_type: Option<&str>, converter: Option<&str>) -> Self {
        let Some(domain_type) = domain_type.filter(|t| !naming::is_void_type(t)) else {
            return Self::disabled();
        };
        match converter.filter(|c| !naming::is_void_type(c)) {
            Some(converter) => Self::converted(domain_type.trim(), converter.trim()),
            None => Self::domain_only(domain_type.trim()),
        }
    }
}

/// One declared pipeline step, immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepModel {
    pub name: String,
    pub service_name: String,
    pub service_namespace: String,
    /// `namespace.ServiceName`
    pub qualified_service: String,
    pub input: TypeMapping,
    pub output: TypeMapping,
    pub streaming: StreamingShape,
    pub targets: BTreeSet<GenerationTarget>,
    pub execution: ExecutionMode,
    pub role: DeploymentRole,
    #[serde(default)]
    pub side_effect: bool,
    /// For side-effect steps, the base step they observe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl StepModel {
    pub fn has_target(&self, target: GenerationTarget) -> bool {
        self.targets.contains(&target)
    }

    /// Fully qualified identifier of the generated client adapter.
    pub fn client_identifier(&self, transport: Transport) -> String {
        naming::client_step_identifier(&self.service_namespace, &self.service_name, transport)
    }

    pub fn declared_input_type(&self) -> Option<&str> {
        self.input.domain_type.as_deref()
    }

    pub fn declared_output_type(&self) -> Option<&str> {
        self.output.domain_type.as_deref()
    }
}

/// A step resolved against its schema service and `remoteProcess` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBinding {
    pub model: StepModel,
    /// Schema file declaring the service
    pub file: String,
    pub service: ServiceDef,
    pub method: MethodDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The aggregate entrypoint running a whole topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorBinding {
    pub entrypoint: StepModel,
    pub base_namespace: String,
    pub transport: Transport,
    pub input_type: String,
    pub output_type: String,
    pub input_streaming: bool,
    pub output_streaming: bool,
    pub first_step_service: String,
    pub first_step_shape: StreamingShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli: Option<CliMetadata>,
}
