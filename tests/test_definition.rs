//! Flow definitions: loading, validation and the `run_flow` entry point

use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use actor_flow::prelude::*;
use actor_flow::{EventType, NullManager, RestartConfigBuilder, RetryRestartManager};

const COPY_FLOW: &str = r#"
name: Copy
description: Copies the lines of one file to another
variables:
  suffix: "!"
actors:
  - type: LineFileReader
    options:
      file: "${input}"
  - type: SetVariable
    options:
      variable_name: last
  - type: Dump
    options:
      file: "${output}"
"#;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_run_flow_success_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "one\ntwo\n").unwrap();

    let definition = FlowDefinition::from_yaml_str(COPY_FLOW).unwrap();
    let code = run_flow(
        &definition,
        vars(&[
            ("input", input.to_str().unwrap()),
            ("output", output.to_str().unwrap()),
        ]),
        Vec::new(),
        Arc::new(NullManager),
    );

    assert_eq!(code, ExitCode::Success);
    assert_eq!(code.code(), 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "one\ntwo\n");
}

#[test]
fn test_run_flow_failure_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let definition = FlowDefinition::from_yaml_str(COPY_FLOW).unwrap();
    let listener = Arc::new(RecordingListener::new());

    let code = run_flow(
        &definition,
        vars(&[
            ("input", dir.path().join("missing.txt").to_str().unwrap()),
            ("output", dir.path().join("out.txt").to_str().unwrap()),
        ]),
        vec![listener.clone() as Arc<dyn FlowExecutionListener>],
        Arc::new(NullManager),
    );

    assert_eq!(code, ExitCode::Failure);
    assert_eq!(code.code(), 1);
    assert_eq!(
        listener.actors_for(EventType::Error),
        vec!["Copy.LineFileReader".to_string()]
    );
    let last = listener.events().pop().unwrap();
    assert_eq!(last.event_type, EventType::FlowFinished);
    assert_eq!(last.payload, Some(json!("failed")));
}

#[test]
fn test_run_flow_unknown_actor_type() {
    let definition = FlowDefinition::from_json_str(
        r#"{"actors": [{"type": "Start"}, {"type": "Teleport"}]}"#,
    )
    .unwrap();
    let code = run_flow(&definition, HashMap::new(), Vec::new(), Arc::new(NullManager));
    assert_eq!(code, ExitCode::Failure);

    let err = Flow::from_definition(definition, &ActorFactory::with_defaults()).unwrap_err();
    assert!(matches!(err, FlowError::UnknownActorType(ref name) if name == "Teleport"));
}

#[test]
fn test_run_time_variables_override_definition() {
    let yaml = r#"
variables:
  greeting: hello
actors:
  - type: Start
  - type: SetVariable
    options:
      variable_name: said
      value: "${greeting}"
"#;
    let definition = FlowDefinition::from_yaml_str(yaml).unwrap();
    let factory = ActorFactory::with_defaults();

    let report = Flow::from_definition(definition.clone(), &factory)
        .unwrap()
        .run();
    assert_eq!(report.variables["said"], "hello");

    let report = Flow::from_definition(definition, &factory)
        .unwrap()
        .with_variable("greeting", "bonjour")
        .run();
    assert_eq!(report.variables["said"], "bonjour");
}

#[test]
fn test_initial_storage_from_definition() {
    let yaml = r#"
storage:
  greeting: hi
actors:
  - type: StorageValue
    options:
      storage_name: greeting
  - type: Convert
    options:
      conversion: upper
  - type: SetStorageValue
    options:
      storage_name: shout
"#;
    let definition = FlowDefinition::from_yaml_str(yaml).unwrap();
    let report = Flow::from_definition(definition, &ActorFactory::with_defaults())
        .unwrap()
        .run();
    assert!(report.is_finished());
    assert_eq!(report.storage.get("shout"), Some(&json!("HI")));
}

#[test]
fn test_validate_reports_configuration_errors() {
    let valid = FlowDefinition::from_yaml_str(COPY_FLOW).unwrap();
    let mut flow = Flow::from_definition(valid, &ActorFactory::with_defaults()).unwrap();
    assert!(flow.validate().is_ok());

    let invalid = FlowDefinition::from_yaml_str(
        r#"
actors:
  - type: Start
  - type: Dump
"#,
    )
    .unwrap();
    let mut flow = Flow::from_definition(invalid, &ActorFactory::with_defaults()).unwrap();
    let err = flow.validate().unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(err.actor_path(), Some("Flow.Dump"));
}

#[test]
fn test_duplicate_names_become_unique() {
    let definition = FlowDefinition::from_yaml_str(
        r#"
actors:
  - type: Start
  - type: Null
  - type: Null
"#,
    )
    .unwrap();
    let flow = Flow::from_definition(definition, &ActorFactory::with_defaults()).unwrap();
    let paths = flow.tree().paths();
    assert_eq!(paths.len(), 4);
    assert_eq!(paths[2], "Flow.Null");
    assert_eq!(paths[3], "Flow.Null-1");
}

#[test]
fn test_outline_of_nested_definition() {
    let definition = FlowDefinition::from_yaml_str(
        r#"
name: Outline
actors:
  - type: Start
  - type: Trigger
    annotation: runs once
    actors:
      - type: StringConstants
        options:
          strings: [a]
      - type: Console
        skip: true
"#,
    )
    .unwrap();
    let flow = Flow::from_definition(definition, &ActorFactory::with_defaults()).unwrap();
    let outline = flow.tree().outline();

    assert_eq!(outline.len(), 5);
    assert_eq!(outline[1].actor_type, "source");
    assert_eq!(outline[1].depth, 1);
    assert_eq!(outline[2].actor_type, "Trigger");
    assert_eq!(outline[2].annotation.as_deref(), Some("runs once"));
    assert_eq!(outline[4].path, "Outline.Trigger.Console");
    assert_eq!(outline[4].depth, 2);
    assert!(outline[4].skip);
}

#[test]
fn test_definition_survives_yaml_round_trip() {
    let definition = FlowDefinition::from_yaml_str(COPY_FLOW).unwrap();
    let yaml = definition.to_yaml_string().unwrap();
    let reloaded = FlowDefinition::from_yaml_str(&yaml).unwrap();

    assert_eq!(reloaded.name, "Copy");
    assert_eq!(reloaded.actors.len(), 3);
    assert_eq!(reloaded.variables["suffix"], "!");
}

#[test]
fn test_engine_config_restarts_failing_flow() {
    let yaml = r#"
actors:
  - type: Start
  - type: Fail
    options:
      message: permanent
"#;
    let definition = FlowDefinition::from_yaml_str(yaml).unwrap();
    let manager = RetryRestartManager::deterministic(
        RestartConfigBuilder::new()
            .max_restarts(2)
            .base_delay(std::time::Duration::from_millis(1))
            .build(),
    );
    let report = Flow::from_definition(definition, &ActorFactory::with_defaults())
        .unwrap()
        .with_restart_manager(Arc::new(manager))
        .run();

    assert_eq!(report.attempts, 3);
    assert_eq!(report.exit_code(), ExitCode::Failure);
}
