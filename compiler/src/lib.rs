//! # pipeworks-compiler
//!
//! Pipeline resolution compiler for Pipeworks.
//!
//! Turns declared pipeline steps, a topology and a compiled schema descriptor
//! set into a resolved plan that code emitters and the runtime consume:
//!
//! - **Step models** - one immutable model per declared step
//! - **Service bindings** - each step bound to its `remoteProcess` method, with
//!   the streaming shape checked against the schema
//! - **Wire types** - generated request/response/stub identifiers
//! - **Orchestrator binding** - the aggregate entrypoint of the topology
//! - **Execution order** - the topology order with aspect side effects inserted
//! - **Placement** - module, host and port for every step
//!
//! ## Example
//!
//! ```rust,ignore
//! use pipeworks_compiler::{compile, CompilationUnit};
//!
//! let unit = CompilationUnit {
//!     name: "orders".to_string(),
//!     description,
//!     descriptors,
//!     client_config: Default::default(),
//! };
//! let pipeline = compile(&unit)?;
//! for failure in &pipeline.failures {
//!     eprintln!("{}: {}", failure.step, failure.message);
//! }
//! ```

pub mod artifacts;
pub mod binding;
pub mod declaration;
pub mod diagnostics;
pub mod driver;
pub mod emit;
pub mod error;
pub mod extract;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod order;
pub mod placement;
pub mod summary;
pub mod wire_types;

pub use artifacts::{
    build_artifacts, write_artifacts, Artifacts, ExecutionOrderArtifact, TelemetryBoundaryArtifact,
    EXECUTION_ORDER_FILE, TELEMETRY_BOUNDARY_FILE,
};
pub use binding::{resolve_binding, resolve_binding_from_protos};
pub use declaration::{
    match_topology, AspectConfig, AspectPosition, AspectScope, OrchestratorMarker,
    PipelineDescription, StepConfig, StepDeclaration, TopologyStep,
};
pub use diagnostics::{Diagnostic, Diagnostics, Outcome, Severity};
pub use driver::{
    compile, compile_with_resolver, CompilationUnit, CompiledPipeline, CompiledStep, StepFailure,
};
pub use emit::{emit_all, Emitter};
pub use error::{CompileError, ErrorKind};
pub use extract::extract_step;
pub use model::{
    CliMetadata, DeploymentRole, ExecutionMode, GenerationTarget, OrchestratorBinding,
    ServiceBinding, StepModel, StreamingShape, Transport, TypeMapping,
};
pub use orchestrator::build_orchestrator_binding;
pub use order::{
    derive_base_order, OrderExpander, OrderExpansion, StepContract, StepContracts,
    SymbolResolver, SyntheticStep,
};
pub use placement::{parse_client_config, resolve_placements, ClientConfig, ModuleConfig, Placement};
pub use summary::CompileSummary;
pub use wire_types::{resolve_wire_types, WireTypes};

pub use pipeworks_schema as schema;
