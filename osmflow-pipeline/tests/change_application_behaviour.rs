//! Behavioural tests for applying change streams through the graph harness.

mod support;

use std::cell::RefCell;

use osmflow_core::{
    ChangeAction, ChangeContainer, EntityContainer,
    test_support::{change, node, way},
};
use osmflow_pipeline::{ChangeApplier, PipelineError};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use support::{MergeRun, identities, run_merge_graph};

/// World state for change application scenarios.
#[derive(Default)]
struct ApplyWorld {
    base: RefCell<Vec<EntityContainer>>,
    changes: RefCell<Vec<ChangeContainer>>,
    runs: RefCell<Vec<MergeRun<EntityContainer>>>,
}

#[fixture]
fn world() -> ApplyWorld {
    ApplyWorld::default()
}

fn apply(base: Vec<EntityContainer>, changes: Vec<ChangeContainer>) -> MergeRun<EntityContainer> {
    run_merge_graph(ChangeApplier, base, changes)
}

fn first_run(world: &ApplyWorld) -> std::cell::Ref<'_, MergeRun<EntityContainer>> {
    std::cell::Ref::map(world.runs.borrow(), |runs| {
        runs.first().expect("the changes should have been applied")
    })
}

// --- Given steps ---

#[given("a base snapshot of nodes 1 and 2 and way 10")]
fn given_base(world: &ApplyWorld) {
    world
        .base
        .replace(vec![node(1, 1), node(2, 1), way(10, 1, &[1, 2])]);
}

#[given("changes modifying node 2, creating node 3 and deleting way 10")]
fn given_changes(world: &ApplyWorld) {
    world.changes.replace(vec![
        change(ChangeAction::Modify, node(2, 2)),
        change(ChangeAction::Create, node(3, 1)),
        change(ChangeAction::Delete, way(10, 1, &[1, 2])),
    ]);
}

#[given("changes listing node 3 before node 2")]
fn given_unsorted_changes(world: &ApplyWorld) {
    world.changes.replace(vec![
        change(ChangeAction::Create, node(3, 1)),
        change(ChangeAction::Modify, node(2, 2)),
    ]);
}

// --- When steps ---

#[when("the changes are applied")]
fn when_applied(world: &ApplyWorld) {
    let run = apply(world.base.borrow().clone(), world.changes.borrow().clone());
    world.runs.borrow_mut().push(run);
}

#[when("the changes are applied twice")]
fn when_applied_twice(world: &ApplyWorld) {
    let changes = world.changes.borrow().clone();
    let once = apply(world.base.borrow().clone(), changes.clone());
    let twice = apply(once.output.items(), changes);
    world.runs.borrow_mut().extend([once, twice]);
}

// --- Then steps ---

#[then("the output is node 1 version 1, node 2 version 2 and node 3 version 1")]
fn then_output(world: &ApplyWorld) {
    let run = first_run(world);
    assert!(run.outcome.is_ok(), "run failed: {:?}", run.outcome);
    assert_eq!(
        identities(&run.output.items()),
        vec!["node 1 v1", "node 2 v2", "node 3 v1"]
    );
}

#[then("the output stream was completed")]
fn then_completed(world: &ApplyWorld) {
    let run = first_run(world);
    assert!(run.output.is_completed());
    assert!(run.output.is_released());
}

#[then("both passes produce the same output")]
fn then_idempotent(world: &ApplyWorld) {
    let runs = world.runs.borrow();
    let [once, twice] = runs.as_slice() else {
        panic!("expected two runs, got {}", runs.len());
    };
    assert!(once.outcome.is_ok() && twice.outcome.is_ok());
    assert_eq!(once.output.items(), twice.output.items());
}

#[then("the run fails with an order violation of node 2 after node 3")]
fn then_order_violation(world: &ApplyWorld) {
    let run = first_run(world);
    match &run.outcome {
        Err(PipelineError::OrderViolation(violation)) => {
            assert_eq!(violation.previous.to_string(), "node 3 v1");
            assert_eq!(violation.current.to_string(), "node 2 v2");
        }
        other => panic!("expected an order violation, got {other:?}"),
    }
}

#[then("the output stream was released without completing")]
fn then_released_incomplete(world: &ApplyWorld) {
    let run = first_run(world);
    assert!(!run.output.is_completed());
    assert!(run.output.is_released());
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/change_application.feature", name = $title)]
        fn $fn_name(world: ApplyWorld) {
            let _ = world;
        }
    };
}

register_scenario!(applies_all_actions, "applying creates, modifies and deletes");
register_scenario!(applies_idempotently, "applying the same changes twice");
register_scenario!(rejects_unsorted_changes, "rejecting an unsorted change stream");
