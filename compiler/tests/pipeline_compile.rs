use pipeworks_compiler::{
    compile, compile_with_resolver, parse_client_config, resolve_binding_from_protos,
    CompilationUnit, CompileError, ErrorKind, GenerationTarget, PipelineDescription,
    StepDeclaration, StreamingShape, EXECUTION_ORDER_FILE, TELEMETRY_BOUNDARY_FILE,
};
use prost_types::{
    DescriptorProto, FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto,
};

const PIPELINE: &str = r#"
base_namespace = "acme.orders"
transport = "GRPC"

[[steps]]
name = "parse-order"
input_type = "acme.orders.RawOrder"
input_converter = "acme.orders.RawOrderMapper"
output_type = "acme.orders.Order"
output_converter = "acme.orders.OrderMapper"

[[steps]]
name = "price-order"
input_type = "acme.orders.Order"
output_type = "acme.orders.Invoice"
kind = "StepOneToMany"

[[steps]]
name = "export-report"
grpc_enabled = false
rest_enabled = true

[step_config.price-order]
dedicated_worker_pool = true

[[topology]]
name = "parse-order"
input_type = "acme.orders.RawOrder"
output_type = "acme.orders.Order"

[[topology]]
name = "price-order"
input_type = "acme.orders.Order"
output_type = "acme.orders.Invoice"

[aspects.persistence]
position = "AFTER_STEP"

[aspects.audit]
position = "BEFORE_STEP"
scope = "STEPS"
target_steps = ["PriceOrder"]

[aspects.cache]

[[orchestrator]]
name = "orders"
description = "Order pricing pipeline"
version = "1.4.0"
"#;

const MODULES: &str = "
# pricing runs on its own host
pipeline.client.base-port=9100
pipeline.module.pricing.host=pricing.internal
pipeline.module.pricing.steps=price-order
pipeline.module.audit.aspects=audit
";

fn message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn remote_process(input: &str, output: &str, client: bool, server: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some("remoteProcess".to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        client_streaming: Some(client),
        server_streaming: Some(server),
        ..Default::default()
    }
}

fn service(name: &str, methods: Vec<MethodDescriptorProto>) -> ServiceDescriptorProto {
    ServiceDescriptorProto {
        name: Some(name.to_string()),
        method: methods,
        ..Default::default()
    }
}

/// Messages in one file, services in two others that import it. The list is
/// deliberately in reverse dependency order.
fn descriptors() -> Vec<FileDescriptorProto> {
    let pricing = FileDescriptorProto {
        name: Some("acme/pricing_svc.proto".to_string()),
        package: Some("acme.orders".to_string()),
        dependency: vec!["acme/order_types.proto".to_string()],
        service: vec![service(
            "ProcessPriceOrderService",
            vec![remote_process(".acme.orders.Order", ".acme.orders.Invoice", false, true)],
        )],
        ..Default::default()
    };
    let parsing = FileDescriptorProto {
        name: Some("acme/parse_svc.proto".to_string()),
        package: Some("acme.orders".to_string()),
        dependency: vec!["acme/order_types.proto".to_string()],
        service: vec![service(
            "ProcessParseOrderService",
            vec![
                remote_process(".acme.orders.RawOrder", ".acme.orders.Order", false, false),
                MethodDescriptorProto {
                    name: Some("health".to_string()),
                    input_type: Some(".acme.orders.RawOrder".to_string()),
                    output_type: Some(".acme.orders.RawOrder".to_string()),
                    ..Default::default()
                },
            ],
        )],
        ..Default::default()
    };
    let types = FileDescriptorProto {
        name: Some("acme/order_types.proto".to_string()),
        package: Some("acme.orders".to_string()),
        message_type: vec![message("RawOrder"), message("Order"), message("Invoice")],
        ..Default::default()
    };
    vec![pricing, parsing, types]
}

fn unit() -> CompilationUnit {
    CompilationUnit {
        name: "orders".to_string(),
        description: toml::from_str(PIPELINE).unwrap(),
        descriptors: descriptors(),
        client_config: parse_client_config(MODULES).unwrap().value,
    }
}

#[test]
fn test_full_pipeline_compiles() {
    let pipeline = compile(&unit()).unwrap();
    assert!(pipeline.is_success(), "failures: {:?}", pipeline.failures);
    assert_eq!(pipeline.steps.len(), 3);

    let parse = pipeline.step("parse-order").unwrap();
    let binding = parse.binding.as_ref().unwrap();
    assert_eq!(binding.file, "acme/parse_svc.proto");
    assert_eq!(
        parse.wire_types.as_ref().unwrap().request_type,
        "acme.orders.OrderTypes.RawOrder"
    );
    assert!(pipeline.diagnostics.has_code("extra-rpc-method"));

    let price = pipeline.step("price-order").unwrap();
    assert_eq!(price.model.streaming, StreamingShape::UnaryStreaming);

    let export = pipeline.step("export-report").unwrap();
    assert!(export.binding.is_none());
    assert!(export.model.has_target(GenerationTarget::RestResource));
}

#[test]
fn test_expanded_order_and_placement() {
    let pipeline = compile(&unit()).unwrap();

    assert_eq!(
        pipeline.order,
        vec![
            "acme.orders.ProcessParseOrderGrpcClientStep",
            "acme.orders.PersistenceOrderSideEffectGrpcClientStep",
            "acme.orders.AuditOrderSideEffectGrpcClientStep",
            "acme.orders.ProcessPriceOrderGrpcClientStep",
            "acme.orders.PersistenceInvoiceSideEffectGrpcClientStep",
        ]
    );
    assert_eq!(pipeline.synthetic.len(), 3);

    let price = pipeline
        .placement("acme.orders.ProcessPriceOrderGrpcClientStep")
        .unwrap();
    assert_eq!(price.module, "pricing");
    assert_eq!(price.host, "pricing.internal");
    assert_eq!(price.port, 9101);

    let audit = pipeline
        .placement("acme.orders.AuditOrderSideEffectGrpcClientStep")
        .unwrap();
    assert_eq!(audit.module, "audit");
    assert_eq!(audit.port, 9102);

    let parse = pipeline
        .placement("acme.orders.ProcessParseOrderGrpcClientStep")
        .unwrap();
    assert_eq!(parse.module, "parse-order-svc");
    assert_eq!(parse.host, "localhost");
    assert_eq!(parse.client_name, "pipeline-parse-order");
}

#[test]
fn test_orchestrator_and_artifacts() {
    let mut pipeline = compile(&unit()).unwrap();

    let orchestrator = pipeline.orchestrator.as_ref().unwrap();
    assert_eq!(orchestrator.input_type, "acme.orders.RawOrder");
    assert_eq!(orchestrator.output_type, "acme.orders.Invoice");
    assert!(!orchestrator.input_streaming);
    assert!(orchestrator.output_streaming);
    assert_eq!(orchestrator.first_step_service, "ProcessParseOrderService");
    assert_eq!(orchestrator.cli.as_ref().unwrap().version.as_deref(), Some("1.4.0"));

    let dir = tempfile::tempdir().unwrap();
    let written = pipeline.write_artifacts(dir.path());
    assert_eq!(written.len(), 2);

    let order: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(EXECUTION_ORDER_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(order["order"].as_array().unwrap().len(), 5);

    let boundary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(TELEMETRY_BOUNDARY_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(boundary["item_input_type"], "acme.orders.RawOrder");
    assert_eq!(
        boundary["consumer_step"],
        "acme.orders.ProcessParseOrderGrpcClientStep"
    );
    assert_eq!(
        boundary["side_effect_parents"]["acme.orders.PersistenceInvoiceSideEffectGrpcClientStep"],
        "acme.orders.ProcessPriceOrderGrpcClientStep"
    );
}

#[test]
fn test_failing_step_does_not_stop_others() {
    let mut unit = unit();
    unit.description.steps.push(StepDeclaration {
        name: "ship-order".to_string(),
        ..Default::default()
    });
    unit.description.steps.push(StepDeclaration {
        name: "weird".to_string(),
        kind: Some("StepSideways".to_string()),
        ..Default::default()
    });

    let pipeline = compile(&unit).unwrap();
    assert!(!pipeline.is_success());
    assert_eq!(pipeline.steps.len(), 3);

    let ship = pipeline.failure("ship-order").unwrap();
    assert_eq!(ship.kind, ErrorKind::Resolution);
    assert!(matches!(ship.error, CompileError::ServiceNotFound { .. }));

    let weird = pipeline.failure("weird").unwrap();
    assert_eq!(weird.kind, ErrorKind::Configuration);
}

#[test]
fn test_unresolvable_schema_fails_grpc_steps_only() {
    let mut unit = unit();
    unit.descriptors.retain(|f| f.name() != "acme/order_types.proto");

    let pipeline = compile(&unit).unwrap();
    assert_eq!(pipeline.failures.len(), 2);
    assert!(pipeline
        .failures
        .iter()
        .all(|f| matches!(f.error, CompileError::Schema(_))));
    assert!(pipeline.failures[0].message.contains("acme/pricing_svc.proto"));
    assert!(pipeline.step("export-report").is_some());
}

#[test]
fn test_multiple_orchestrators_rejected() {
    let mut unit = unit();
    let mut second = unit.description.orchestrator[0].clone();
    second.name = "orders-v2".to_string();
    unit.description.orchestrator.push(second);

    let err = compile(&unit).unwrap_err();
    assert_eq!(
        err,
        CompileError::MultipleOrchestrators(vec!["orders".to_string(), "orders-v2".to_string()])
    );
}

#[test]
fn test_orchestrator_boundary_from_topology() {
    let description: PipelineDescription = toml::from_str(
        r#"
base_namespace = "acme"

[[topology]]
name = "A"
input_type = "X"
output_type = "Y"

[[topology]]
name = "B"
input_type = "Y"
output_type = "Y"
cardinality = "ONE_TO_MANY"

[[topology]]
name = "C"
input_type = "Y"
output_type = "Z"
"#,
    )
    .unwrap();
    let pipeline = compile(&CompilationUnit {
        name: "xyz".to_string(),
        description,
        ..Default::default()
    })
    .unwrap();

    let orchestrator = pipeline.orchestrator.unwrap();
    assert_eq!(orchestrator.input_type, "X");
    assert_eq!(orchestrator.output_type, "Z");
    assert!(!orchestrator.input_streaming);
    assert!(orchestrator.output_streaming);
    assert_eq!(pipeline.diagnostics.with_code("topology-step-unmatched").count(), 3);
}

#[test]
fn test_orchestrator_streaming_follows_declared_kind() {
    let description: PipelineDescription = toml::from_str(
        r#"
base_namespace = "acme"

[[steps]]
name = "a"

[[steps]]
name = "b"
kind = "StepOneToMany"

[[steps]]
name = "c"

[[topology]]
name = "A"
input_type = "X"
output_type = "Y"

[[topology]]
name = "B"
input_type = "Y"
output_type = "Y"

[[topology]]
name = "C"
input_type = "Y"
output_type = "Z"
"#,
    )
    .unwrap();
    let mut unit = CompilationUnit {
        name: "xyz".to_string(),
        description,
        ..Default::default()
    };
    let pipeline = compile(&unit).unwrap();

    let orchestrator = pipeline.orchestrator.unwrap();
    assert!(!orchestrator.input_streaming);
    assert!(orchestrator.output_streaming);
    assert_eq!(orchestrator.entrypoint.streaming, StreamingShape::UnaryStreaming);
    assert_eq!(orchestrator.first_step_shape, StreamingShape::UnaryUnary);

    unit.description.topology[1].cardinality = Some("MANY_TO_MANY".to_string());
    let err = compile(&unit).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("'B'"));
}

#[test]
fn test_token_matched_topology_keeps_every_step() {
    let description: PipelineDescription = toml::from_str(
        r#"
base_namespace = "acme"

[[steps]]
name = "validate-order"
grpc_enabled = false
rest_enabled = true

[[steps]]
name = "ship"
grpc_enabled = false
rest_enabled = true

[[topology]]
name = "validate-order"
input_type = "acme.Order"
output_type = "acme.Checked"

[[topology]]
name = "ship-order"
input_type = "acme.Checked"
output_type = "acme.Shipment"
"#,
    )
    .unwrap();
    let pipeline = compile(&CompilationUnit {
        name: "shipping".to_string(),
        description,
        ..Default::default()
    })
    .unwrap();

    assert_eq!(
        pipeline.order,
        vec![
            "acme.ProcessValidateOrderGrpcClientStep",
            "acme.ProcessShipGrpcClientStep"
        ]
    );
    assert!(pipeline.placement("acme.ProcessShipGrpcClientStep").is_some());
    assert_eq!(
        pipeline.artifacts.as_ref().unwrap().telemetry_boundary.producer_step.as_deref(),
        Some("acme.ProcessShipGrpcClientStep")
    );
}

#[test]
fn test_unverified_side_effects_are_reported() {
    let resolver = |id: &str| !id.contains("Audit");
    let pipeline = compile_with_resolver(&unit(), Some(&resolver)).unwrap();

    let unverified: Vec<_> = pipeline
        .diagnostics
        .with_code("unverified-synthetic-step")
        .map(|d| d.subject.as_str())
        .collect();
    assert_eq!(unverified, vec!["acme.orders.AuditOrderSideEffectGrpcClientStep"]);
    assert!(pipeline.is_success());
}

#[test]
fn test_streaming_shape_round_trip() {
    for declared in StreamingShape::ALL {
        for actual in StreamingShape::ALL {
            let protos = vec![FileDescriptorProto {
                name: Some("shape.proto".to_string()),
                package: Some("acme".to_string()),
                message_type: vec![message("In"), message("Out")],
                service: vec![service(
                    "ProcessShapeService",
                    vec![remote_process(
                        ".acme.In",
                        ".acme.Out",
                        actual.input_streaming(),
                        actual.output_streaming(),
                    )],
                )],
                ..Default::default()
            }];
            let model = pipeworks_compiler::extract_step(
                &StepDeclaration {
                    name: "shape".to_string(),
                    namespace: Some("acme".to_string()),
                    kind: Some(format!("{:?}", declared)),
                    ..Default::default()
                },
                None,
            )
            .unwrap();

            let result = resolve_binding_from_protos(&model, &protos);
            if declared == actual {
                assert!(result.is_ok(), "{} should bind", declared);
            } else {
                let message = result.unwrap_err().to_string();
                assert!(message.contains(declared.label()), "{}", message);
                assert!(message.contains(actual.label()), "{}", message);
            }
        }
    }
}
