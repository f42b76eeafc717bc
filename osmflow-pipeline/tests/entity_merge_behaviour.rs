//! Behavioural tests for [`EntityMerger`] conflict resolution.

mod support;

use std::cell::{Cell, RefCell};

use osmflow_core::{EntityContainer, test_support::node_at};
use osmflow_pipeline::{ConflictResolutionMethod, EntityMerger};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use support::run_merge_graph;

/// World state for snapshot merge scenarios.
#[derive(Default)]
struct MergeWorld {
    first: RefCell<Option<EntityContainer>>,
    second: RefCell<Option<EntityContainer>>,
    output: RefCell<Vec<EntityContainer>>,
    ran: Cell<bool>,
}

#[fixture]
fn world() -> MergeWorld {
    MergeWorld::default()
}

fn sources(world: &MergeWorld, first_secs: i64, second_secs: i64) {
    world.first.replace(Some(node_at(5, 1, first_secs)));
    world.second.replace(Some(node_at(5, 2, second_secs)));
}

fn merge(world: &MergeWorld, method: ConflictResolutionMethod) {
    let first = world.first.borrow().clone().expect("first source is set");
    let second = world.second.borrow().clone().expect("second source is set");
    let run = run_merge_graph(EntityMerger::new(method), vec![first], vec![second]);
    if let Err(err) = run.outcome {
        panic!("merge failed: {err}");
    }
    world.output.replace(run.output.items());
    world.ran.set(true);
}

// --- Given steps ---

#[given("node 5 is older on the first source than on the second")]
fn given_first_older(world: &MergeWorld) {
    sources(world, 10, 20);
}

#[given("node 5 is newer on the first source than on the second")]
fn given_first_newer(world: &MergeWorld) {
    sources(world, 20, 10);
}

#[given("node 5 has the same timestamp on both sources")]
fn given_tie(world: &MergeWorld) {
    sources(world, 15, 15);
}

// --- When steps ---

#[when("the sources are merged keeping the newest timestamp")]
fn when_timestamp(world: &MergeWorld) {
    merge(world, ConflictResolutionMethod::Timestamp);
}

#[when("the sources are merged preferring the second source")]
fn when_latest_source(world: &MergeWorld) {
    merge(world, ConflictResolutionMethod::LatestSource);
}

// --- Then steps ---

#[then("the second source's node 5 is emitted")]
fn then_second(world: &MergeWorld) {
    assert!(world.ran.get());
    let expected = world.second.borrow().clone().into_iter().collect::<Vec<_>>();
    assert_eq!(*world.output.borrow(), expected);
}

#[then("the first source's node 5 is emitted")]
fn then_first(world: &MergeWorld) {
    assert!(world.ran.get());
    let expected = world.first.borrow().clone().into_iter().collect::<Vec<_>>();
    assert_eq!(*world.output.borrow(), expected);
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/entity_merge.feature", name = $title)]
        fn $fn_name(world: MergeWorld) {
            let _ = world;
        }
    };
}

register_scenario!(
    timestamp_keeps_newer_second,
    "the timestamp policy keeps the newer second element"
);
register_scenario!(
    timestamp_keeps_newer_first,
    "the timestamp policy keeps the newer first element"
);
register_scenario!(
    timestamp_tie_prefers_second,
    "the timestamp policy breaks ties towards the second source"
);
register_scenario!(
    latest_source_ignores_time,
    "the latest source policy ignores timestamps"
);
