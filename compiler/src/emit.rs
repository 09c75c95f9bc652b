use crate::driver::{CompiledPipeline, CompiledStep};
use crate::model::OrchestratorBinding;
use crate::placement::Placement;

/// Consumer of a resolved pipeline.
///
/// Code generators implement this; the compiler only decides what each one
/// receives and in which order.
pub trait Emitter {
    type Error;

    fn emit_step(
        &mut self,
        step: &CompiledStep,
        placement: Option<&Placement>,
    ) -> Result<(), Self::Error>;

    fn emit_orchestrator(
        &mut self,
        orchestrator: &OrchestratorBinding,
        order: &[String],
    ) -> Result<(), Self::Error>;

    /// Called once after every step and the orchestrator were emitted.
    fn finish(&mut self, _pipeline: &CompiledPipeline) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Feed every compiled step, then the orchestrator, to `emitter`.
///
/// Returns the number of steps emitted.
pub fn emit_all<E: Emitter>(pipeline: &CompiledPipeline, emitter: &mut E) -> Result<usize, E::Error> {
    for step in &pipeline.steps {
        let identifier = step.model.client_identifier(pipeline.transport);
        emitter.emit_step(step, pipeline.placement(&identifier))?;
    }
    if let Some(orchestrator) = &pipeline.orchestrator {
        emitter.emit_orchestrator(orchestrator, &pipeline.order)?;
    }
    emitter.finish(pipeline)?;
    Ok(pipeline.steps.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{PipelineDescription, StepDeclaration, TopologyStep};
    use crate::driver::{compile, CompilationUnit};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Emitter for Recorder {
        type Error = String;

        fn emit_step(
            &mut self,
            step: &CompiledStep,
            placement: Option<&Placement>,
        ) -> Result<(), String> {
            let module = placement.map(|p| p.module.as_str()).unwrap_or("-");
            self.events.push(format!("step:{}@{}", step.model.name, module));
            Ok(())
        }

        fn emit_orchestrator(
            &mut self,
            orchestrator: &OrchestratorBinding,
            order: &[String],
        ) -> Result<(), String> {
            self.events.push(format!(
                "orchestrator:{}->{}:{}",
                orchestrator.input_type,
                orchestrator.output_type,
                order.len()
            ));
            Ok(())
        }

        fn finish(&mut self, _pipeline: &CompiledPipeline) -> Result<(), String> {
            self.events.push("finish".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_emit_order() {
        let unit = CompilationUnit {
            name: "rest-only".to_string(),
            description: PipelineDescription {
                base_namespace: "acme".to_string(),
                steps: vec![StepDeclaration {
                    name: "export".to_string(),
                    grpc_enabled: Some(false),
                    rest_enabled: Some(true),
                    ..Default::default()
                }],
                topology: vec![TopologyStep::new("export", "acme.Row", "acme.Report")],
                ..Default::default()
            },
            ..Default::default()
        };
        let pipeline = compile(&unit).unwrap();

        let mut recorder = Recorder::default();
        assert_eq!(emit_all(&pipeline, &mut recorder).unwrap(), 1);
        assert_eq!(
            recorder.events,
            vec![
                "step:export@export-svc",
                "orchestrator:acme.Row->acme.Report:1",
                "finish"
            ]
        );
    }
}
