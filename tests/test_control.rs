//! Integration tests for the control actors: the triggers, Branch,
//! ArrayProcess, TryCatch, the conditionals and callable actors

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use actor_flow::actors::sink::{Null, SetStorageValue};
use actor_flow::actors::source::{Start, StringConstants};
use actor_flow::actors::transform::{Convert, Fail, SetVariable};
use actor_flow::engine::control::{Case, ForLoop};
use actor_flow::prelude::*;

// ============================================================================
// Test actors
// ============================================================================

/// Sink collecting payloads
#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<JsonValue>>>);

impl Collect {
    fn values(&self) -> Vec<JsonValue> {
        self.0.lock().clone()
    }
}

impl Sink for Collect {
    fn consume(&mut self, token: Token, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        self.0.lock().push(token.into_payload());
        Ok(())
    }
}

/// Sink appending a fixed label to a shared log
struct Label {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Sink for Label {
    fn consume(&mut self, _token: Token, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        self.log.lock().push(self.label);
        Ok(())
    }
}

/// Sink that takes a while and counts its calls
struct Slow {
    pause: Duration,
    runs: Arc<AtomicUsize>,
}

impl Sink for Slow {
    fn consume(&mut self, _token: Token, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        thread::sleep(self.pause);
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn slow(name: &str, millis: u64, runs: &Arc<AtomicUsize>) -> ActorNode {
    ActorNode::sink(
        name,
        Slow {
            pause: Duration::from_millis(millis),
            runs: runs.clone(),
        },
    )
}

/// Source emitting one fixed payload per activation
struct Emit {
    payload: JsonValue,
    pending: bool,
}

impl Emit {
    fn new(payload: JsonValue) -> Self {
        Self {
            payload,
            pending: false,
        }
    }
}

impl Source for Emit {
    fn start(&mut self, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        self.pending = true;
        Ok(())
    }

    fn has_more_tokens(&self) -> bool {
        self.pending
    }

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        self.pending = false;
        Ok(ctx.token(self.payload.clone()))
    }
}

fn run(children: Vec<ActorNode>) -> RunReport {
    Flow::new(ActorTree::new(ActorNode::sequence("Flow", children))).run()
}

fn labels(log: &Arc<Mutex<Vec<&'static str>>>, names: &[&'static str]) -> Vec<ActorNode> {
    names
        .iter()
        .map(|name| {
            ActorNode::sink(
                *name,
                Label {
                    label: *name,
                    log: log.clone(),
                },
            )
        })
        .collect()
}

// ============================================================================
// Trigger
// ============================================================================

#[test]
fn test_trigger_runs_source_subflow_and_forwards_input() {
    let inner = Collect::default();
    let outer = Collect::default();
    let report = run(vec![
        ActorNode::source("Start", Start::default()),
        ActorNode::trigger(
            "Trigger",
            vec![
                ActorNode::source("StringConstants", StringConstants::default())
                    .with_option("strings", json!(["x", "y"])),
                ActorNode::sink("Inner", inner.clone()),
            ],
        ),
        ActorNode::trigger("Trigger", vec![ActorNode::sink("Null", Null)]),
        ActorNode::sink("Outer", outer.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(inner.values(), vec![json!("x"), json!("y")]);
    assert_eq!(outer.values(), vec![JsonValue::Null]);
}

#[test]
fn test_trigger_feeds_input_to_subflow() {
    let inner = Collect::default();
    let outer = Collect::default();
    let report = run(vec![
        ActorNode::source("ForLoop", ForLoop::new()).with_option("upper", 2),
        ActorNode::trigger(
            "Trigger",
            vec![
                ActorNode::transformer("Convert", Convert),
                ActorNode::sink("Inner", inner.clone()),
            ],
        ),
        ActorNode::sink("Outer", outer.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(inner.values(), vec![json!("1"), json!("2")]);
    assert_eq!(outer.values(), vec![json!(1), json!(2)]);
}

#[test]
fn test_variables_are_read_per_activation() {
    let collect = Collect::default();
    let report = run(vec![
        ActorNode::source("ForLoop", ForLoop::new()).with_option("upper", 3),
        ActorNode::transformer("SetVariable", SetVariable).with_option("variable_name", "n"),
        ActorNode::trigger(
            "Trigger",
            vec![
                ActorNode::source("Inner", ForLoop::new()).with_option("upper", "${n}"),
                ActorNode::sink("Collect", collect.clone()),
            ],
        ),
    ]);

    assert!(report.is_finished());
    assert_eq!(
        collect.values(),
        vec![json!(1), json!(1), json!(2), json!(1), json!(2), json!(3)]
    );
}

#[test]
fn test_unknown_variable_at_runtime_fails() {
    let report = run(vec![
        ActorNode::source("ForLoop", ForLoop::new()).with_option("upper", "${missing}"),
        ActorNode::sink("Null", Null),
    ]);
    let err = report.outcome.error().expect("run should fail");
    assert!(matches!(err.root_cause(), FlowError::UnknownVariable(name) if name == "missing"));
}

// ============================================================================
// Branch
// ============================================================================

#[test]
fn test_branch_sequential_is_deterministic() {
    for _ in 0..5 {
        let log = Arc::new(Mutex::new(Vec::new()));
        let report = run(vec![
            ActorNode::source("Start", Start::default()),
            ActorNode::branch("Branch", labels(&log, &["a", "b", "c"])).with_option("num_threads", 1),
        ]);
        assert!(report.is_finished());
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }
}

#[test]
fn test_branch_parallel_runs_every_branch() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let report = run(vec![
        ActorNode::source("ForLoop", ForLoop::new()).with_option("upper", 3),
        ActorNode::branch("Branch", labels(&log, &["a", "b", "c", "d"])).with_option("num_threads", -1),
    ]);

    assert!(report.is_finished());
    let mut seen = log.lock().clone();
    assert_eq!(seen.len(), 12);
    seen.sort();
    seen.dedup();
    assert_eq!(seen, vec!["a", "b", "c", "d"]);
}

#[test]
fn test_branches_share_storage() {
    let branches = ["left", "right"]
        .iter()
        .map(|name| {
            ActorNode::sink(*name, SetStorageValue).with_option("storage_name", *name)
        })
        .collect();
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!({"k": 1}))),
        ActorNode::branch("Branch", branches).with_option("num_threads", 2),
    ]);

    assert!(report.is_finished());
    assert_eq!(report.storage.get("left"), Some(&json!({"k": 1})));
    assert_eq!(report.storage.get("right"), Some(&json!({"k": 1})));
}

#[test]
fn test_branch_failure_fails_the_flow() {
    for threads in [1, 3] {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut branches = labels(&log, &["a", "b"]);
        branches.insert(1, ActorNode::transformer("Fail", Fail).with_option("message", "broken branch"));

        let report = run(vec![
            ActorNode::source("Start", Start::default()),
            ActorNode::branch("Branch", branches).with_option("num_threads", threads),
        ]);
        let err = report.outcome.error().expect("run should fail");
        assert_eq!(err.actor_path(), Some("Flow.Branch.Fail"));
    }
}

#[test]
fn test_parallel_branch_failure_skips_pending_branches() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut branches = vec![ActorNode::transformer("Fail", Fail).with_option("message", "early")];
    branches.extend((0..8).map(|i| slow(&format!("Slow{}", i), 50, &runs)));

    let report = run(vec![
        ActorNode::source("Start", Start::default()),
        ActorNode::branch("Branch", branches).with_option("num_threads", 2),
    ]);

    let err = report.outcome.error().expect("run should fail");
    assert_eq!(err.actor_path(), Some("Flow.Branch.Fail"));
    assert!(runs.load(Ordering::SeqCst) < 8, "pending branches were not cancelled");
}

#[test]
fn test_parallel_branches_share_a_parallel_callable() {
    let runs = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();
    let counter = runs.clone();

    thread::spawn(move || {
        let callable = ActorNode::branch(
            "fan",
            vec![slow("Slow", 10, &counter), slow("Slow", 10, &counter)],
        )
        .with_option("num_threads", 2);
        let users = (0..4)
            .map(|i| ActorNode::callable_sink(format!("Use{}", i), "fan"))
            .collect();
        let report = run(vec![
            ActorNode::callable_actors("CallableActors", vec![callable]),
            ActorNode::source("Start", Start::default()),
            ActorNode::branch("Branch", users).with_option("num_threads", 2),
        ]);
        let _ = tx.send(report.outcome.to_string());
    });

    let outcome = rx
        .recv_timeout(Duration::from_secs(30))
        .expect("flow did not finish");
    assert_eq!(outcome, "finished");
    assert_eq!(runs.load(Ordering::SeqCst), 8);
}

#[test]
fn test_branch_invalid_thread_count() {
    let report = run(vec![
        ActorNode::source("Start", Start::default()),
        ActorNode::branch("Branch", vec![ActorNode::sink("Null", Null)]).with_option("num_threads", -2),
    ]);
    assert!(report.outcome.error().is_some_and(FlowError::is_config_error));
}

// ============================================================================
// ArrayProcess
// ============================================================================

#[test]
fn test_array_process_maps_elements() {
    let collect = Collect::default();
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!(["de", "fr"]))),
        ActorNode::array_process(
            "ArrayProcess",
            vec![ActorNode::transformer("Convert", Convert).with_option("conversion", "upper")],
        ),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(collect.values(), vec![json!(["DE", "FR"])]);
}

#[test]
fn test_array_process_empty_array() {
    let collect = Collect::default();
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!([]))),
        ActorNode::array_process("ArrayProcess", vec![ActorNode::transformer("Fail", Fail)]),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(collect.values(), vec![json!([])]);
}

#[test]
fn test_array_process_aborts_on_failing_element() {
    let collect = Collect::default();
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!(["a", "b", "c"]))),
        ActorNode::array_process(
            "ArrayProcess",
            vec![
                ActorNode::transformer("Fail", Fail).with_option("fail_on", "b"),
                ActorNode::transformer("Convert", Convert),
            ],
        ),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    let err = report.outcome.error().expect("run should fail");
    assert_eq!(err.actor_path(), Some("Flow.ArrayProcess.Fail"));
    assert!(collect.values().is_empty());
}

#[test]
fn test_array_process_rejects_non_array() {
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!("not an array"))),
        ActorNode::array_process("ArrayProcess", vec![ActorNode::transformer("Convert", Convert)]),
        ActorNode::sink("Null", Null),
    ]);
    let err = report.outcome.error().expect("run should fail");
    assert!(matches!(err.root_cause(), FlowError::Runtime(_)));
}

#[test]
fn test_array_process_needs_producing_subflow() {
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!([1]))),
        ActorNode::array_process("ArrayProcess", vec![ActorNode::sink("Null", Null)]),
        ActorNode::sink("Null", Null),
    ]);
    assert!(report.outcome.error().is_some_and(FlowError::is_config_error));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_array_process_keeps_length_and_order(values in prop::collection::vec(any::<i32>(), 0..40)) {
        let collect = Collect::default();
        let report = run(vec![
            ActorNode::source("Emit", Emit::new(json!(values))),
            ActorNode::array_process("ArrayProcess", vec![ActorNode::transformer("Convert", Convert)]),
            ActorNode::sink("Collect", collect.clone()),
        ]);

        prop_assert!(report.is_finished());
        let expected: Vec<JsonValue> = values.iter().map(|v| json!(v.to_string())).collect();
        prop_assert_eq!(collect.values(), vec![JsonValue::Array(expected)]);
    }
}

// ============================================================================
// TryCatch
// ============================================================================

#[test]
fn test_try_catch_runs_catch_on_error() {
    let caught = Collect::default();
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!("payload"))),
        ActorNode::try_catch(
            "TryCatch",
            vec![ActorNode::transformer("Fail", Fail).with_option("message", "boom")],
            vec![ActorNode::transformer("Convert", Convert).with_option("conversion", "upper")],
        )
        .with_option("error_variable", "error"),
        ActorNode::sink("Collect", caught.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(caught.values(), vec![json!("PAYLOAD")]);
    let message = report.variables.get("error").cloned().unwrap_or_default();
    assert!(message.contains("boom"), "unexpected message: {}", message);
}

#[test]
fn test_try_catch_passes_try_output() {
    let collect = Collect::default();
    let report = run(vec![
        ActorNode::source("Emit", Emit::new(json!("ok"))),
        ActorNode::try_catch(
            "TryCatch",
            vec![ActorNode::transformer("Convert", Convert).with_option("conversion", "upper")],
            vec![ActorNode::transformer("Fail", Fail)],
        ),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(collect.values(), vec![json!("OK")]);
    assert!(!report.variables.contains_key("trycatch"));
}

// ============================================================================
// IfThenElse, IfStorageValue and Switch
// ============================================================================

fn strings(values: &[&str]) -> ActorNode {
    ActorNode::source("StringConstants", StringConstants::default()).with_option("strings", json!(values))
}

fn upper() -> ActorNode {
    ActorNode::transformer("Convert", Convert).with_option("conversion", "upper")
}

#[test]
fn test_if_then_else_routes_each_token() {
    let collect = Collect::default();
    let report = run(vec![
        strings(&["a", "bb", "c"]),
        ActorNode::if_then_else("IfThenElse", vec![upper()], Vec::new())
            .with_option("condition", json!({"matches": "^b"})),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished(), "outcome: {}", report.outcome);
    assert_eq!(collect.values(), vec![json!("a"), json!("BB"), json!("c")]);
}

#[test]
fn test_if_then_else_reads_variables_per_token() {
    let collect = Collect::default();
    let report = run(vec![
        strings(&["fast", "slow", "fast"]),
        ActorNode::transformer("SetVariable", SetVariable).with_option("variable_name", "mode"),
        ActorNode::if_then_else("IfThenElse", vec![upper()], Vec::new())
            .with_option("condition", json!({"value": "${mode}", "equals": "fast"})),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished(), "outcome: {}", report.outcome);
    assert_eq!(
        collect.values(),
        vec![json!("FAST"), json!("slow"), json!("FAST")]
    );
}

#[test]
fn test_if_storage_value_sees_earlier_writes() {
    let collect = Collect::default();
    let report = run(vec![
        strings(&["a", "b", "c"]),
        ActorNode::if_storage_value(
            "IfStorageValue",
            vec![upper()],
            vec![ActorNode::sink("SetStorageValue", SetStorageValue).with_option("storage_name", "first")],
        )
        .with_option("storage_name", "first"),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished(), "outcome: {}", report.outcome);
    assert_eq!(collect.values(), vec![json!("B"), json!("C")]);
    assert_eq!(report.storage.get("first"), Some(&json!("a")));
}

#[test]
fn test_if_then_else_without_condition_fails_set_up() {
    let report = run(vec![
        ActorNode::source("Start", Start::default()),
        ActorNode::if_then_else("IfThenElse", vec![ActorNode::sink("Null", Null)], Vec::new()),
    ]);

    let err = report.outcome.error().expect("set-up should fail");
    assert!(err.is_config_error());
    assert_eq!(err.actor_path(), Some("Flow.IfThenElse"));
}

#[test]
fn test_switch_first_matching_case_wins() {
    let collect = Collect::default();
    let report = run(vec![
        strings(&["apple", "banana", "cherry"]),
        ActorNode::switch(
            "Switch",
            vec![
                Case::new(json!({"matches": "^a"}), vec![upper()]),
                Case::new(json!({"matches": "a"}), Vec::new()),
            ],
            None,
        ),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished(), "outcome: {}", report.outcome);
    assert_eq!(collect.values(), vec![json!("APPLE"), json!("banana")]);
}

#[test]
fn test_switch_default_takes_unmatched_tokens() {
    let collect = Collect::default();
    let report = run(vec![
        strings(&["apple", "cherry"]),
        ActorNode::switch(
            "Switch",
            vec![Case::new(json!({"equals": "apple"}), vec![upper()])],
            Some(vec![
                ActorNode::sink("SetStorageValue", SetStorageValue).with_option("storage_name", "other"),
            ]),
        ),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished(), "outcome: {}", report.outcome);
    assert_eq!(collect.values(), vec![json!("APPLE")]);
    assert_eq!(report.storage.get("other"), Some(&json!("cherry")));
}

#[test]
fn test_switch_malformed_case_fails_set_up() {
    let report = run(vec![
        ActorNode::source("Start", Start::default()),
        ActorNode::switch(
            "Switch",
            vec![Case::new(json!(3), vec![ActorNode::sink("Null", Null)])],
            None,
        ),
    ]);

    let err = report.outcome.error().expect("set-up should fail");
    assert!(err.is_config_error());
    assert_eq!(err.actor_path(), Some("Flow.Switch"));
}

// ============================================================================
// LocalScopeTrigger
// ============================================================================

fn scoped_run(local: bool) -> (RunReport, Vec<JsonValue>) {
    let seen = Collect::default();
    let local_scope = ActorNode::local_scope_trigger(
        "Local",
        vec![
            strings(&["${who}"]),
            ActorNode::transformer("SetVariable", SetVariable)
                .with_option("variable_name", "who")
                .with_option("value", "inner"),
            ActorNode::sink("SetStorageValue", SetStorageValue).with_option("storage_name", "total"),
        ],
    )
    .with_option("local_variables", local)
    .with_option("local_storage", local);

    let report = Flow::new(ActorTree::new(ActorNode::sequence(
        "Flow",
        vec![
            ActorNode::source("Start", Start::default()),
            local_scope,
            ActorNode::trigger(
                "Check",
                vec![strings(&["${who}"]), ActorNode::sink("Collect", seen.clone())],
            ),
        ],
    )))
    .with_variable("who", "outer")
    .with_storage_value("total", json!(1))
    .run();
    (report, seen.values())
}

#[test]
fn test_local_scope_trigger_discards_changes() {
    let (report, seen) = scoped_run(true);
    assert!(report.is_finished(), "outcome: {}", report.outcome);
    assert_eq!(seen, vec![json!("outer")]);
    assert_eq!(report.variables["who"], "outer");
    assert_eq!(report.storage.get("total"), Some(&json!(1)));
}

#[test]
fn test_local_scope_trigger_can_share_scope() {
    let (report, seen) = scoped_run(false);
    assert!(report.is_finished(), "outcome: {}", report.outcome);
    assert_eq!(seen, vec![json!("inner")]);
    assert_eq!(report.variables["who"], "inner");
    assert_eq!(report.storage.get("total"), Some(&json!("outer")));
}

// ============================================================================
// Callable actors
// ============================================================================

#[test]
fn test_callable_transformer() {
    let collect = Collect::default();
    let report = run(vec![
        ActorNode::callable_actors(
            "CallableActors",
            vec![ActorNode::transformer("upper", Convert).with_option("conversion", "upper")],
        ),
        ActorNode::source("StringConstants", StringConstants::default())
            .with_option("strings", json!(["a", "b"])),
        ActorNode::callable_transformer("Apply", "upper"),
        ActorNode::sink("Collect", collect.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(collect.values(), vec![json!("A"), json!("B")]);
}

#[test]
fn test_callable_nearest_scope_wins() {
    let inner = Collect::default();
    let outer = Collect::default();
    let report = run(vec![
        ActorNode::callable_actors(
            "CallableActors",
            vec![ActorNode::transformer("conv", Convert).with_option("conversion", "upper")],
        ),
        ActorNode::source("StringConstants", StringConstants::default())
            .with_option("strings", json!(["Ab"])),
        ActorNode::trigger(
            "Trigger",
            vec![
                ActorNode::callable_actors(
                    "CallableActors",
                    vec![ActorNode::transformer("conv", Convert).with_option("conversion", "lower")],
                ),
                ActorNode::callable_transformer("Apply", "conv"),
                ActorNode::sink("Inner", inner.clone()),
            ],
        ),
        ActorNode::callable_transformer("Apply", "conv"),
        ActorNode::sink("Outer", outer.clone()),
    ]);

    assert!(report.is_finished());
    assert_eq!(inner.values(), vec![json!("ab")]);
    assert_eq!(outer.values(), vec![json!("AB")]);
}

#[test]
fn test_callable_source_and_sink() {
    let collect = Collect::default();
    let report = run(vec![
        ActorNode::callable_actors(
            "CallableActors",
            vec![
                ActorNode::source("numbers", ForLoop::new()).with_option("upper", 3),
                ActorNode::sink("out", collect.clone()),
            ],
        ),
        ActorNode::callable_source("Numbers", "numbers"),
        ActorNode::callable_sink("Out", "out"),
    ]);

    assert!(report.is_finished());
    assert_eq!(collect.values(), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_unresolved_callable_names_reference_and_actor() {
    let report = run(vec![
        ActorNode::source("Start", Start::default()),
        ActorNode::callable_sink("Out", "missing"),
    ]);

    let err = report.outcome.error().expect("set-up should fail");
    match err.root_cause() {
        FlowError::UnresolvedCallable { reference, actor } => {
            assert_eq!(reference, "missing");
            assert_eq!(actor, "Flow.Out");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_callable_role_mismatch() {
    let report = run(vec![
        ActorNode::callable_actors("CallableActors", vec![ActorNode::sink("out", Null)]),
        ActorNode::source("Start", Start::default()),
        ActorNode::callable_transformer("Apply", "out"),
        ActorNode::sink("Null", Null),
    ]);
    assert!(report.outcome.error().is_some_and(FlowError::is_config_error));
}

#[test]
fn test_callable_cycle_is_rejected() {
    let report = run(vec![
        ActorNode::callable_actors(
            "CallableActors",
            vec![
                ActorNode::sequence("a", vec![ActorNode::callable_transformer("ToB", "b")]),
                ActorNode::sequence("b", vec![ActorNode::callable_transformer("ToA", "a")]),
            ],
        ),
        ActorNode::source("Start", Start::default()),
        ActorNode::callable_transformer("Apply", "a"),
        ActorNode::sink("Null", Null),
    ]);

    let err = report.outcome.error().expect("set-up should fail");
    assert!(matches!(
        err.root_cause(),
        FlowError::CyclicCallableReference(_)
    ));
}
