//! Shared helpers for the pipeline behaviour tests.

use osmflow_pipeline::{
    CollectHandle, CollectSink, GraphBuilder, MergeJoin, PipeItem, PipeRef, PipelineError,
};

/// Outcome of a pipeline run together with what reached its sink.
pub struct MergeRun<T> {
    pub outcome: Result<(), PipelineError>,
    pub output: CollectHandle<T>,
}

/// Run `left` and `right` through a single merge stage built by the graph
/// harness, collecting the merged stream.
pub fn run_merge_graph<J>(join: J, left: Vec<J::Left>, right: Vec<J::Right>) -> MergeRun<J::Output>
where
    J: MergeJoin,
{
    let (sink, output) = CollectSink::<J::Output>::new();
    let mut graph = GraphBuilder::default();
    graph
        .source("left", "left", left)
        .and_then(|g| g.source("right", "right", right))
        .and_then(|g| g.merge("merge", join, ["left".into(), "right".into()], PipeRef::Default))
        .and_then(|g| g.sink("collect", PipeRef::Default, sink))
        .unwrap_or_else(|err| panic!("merge graph must wire: {err}"));
    let outcome = graph
        .build()
        .map_err(PipelineError::from)
        .and_then(|pipeline| pipeline.run());
    MergeRun { outcome, output }
}

/// Kind, identifier and version of each item, for compact assertions.
pub fn identities<T: PipeItem>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.identity().to_string()).collect()
}
