//! Merge two change streams into one.

use osmflow_core::ChangeContainer;

use super::{ConflictResolutionMethod, MergeJoin};

/// Joins two change streams; when both touch the same element, the record
/// whose element wins under the [`ConflictResolutionMethod`] is kept whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeMerger {
    method: ConflictResolutionMethod,
}

impl ChangeMerger {
    /// A merger resolving conflicts with `method`.
    #[must_use]
    pub const fn new(method: ConflictResolutionMethod) -> Self {
        Self { method }
    }
}

impl MergeJoin for ChangeMerger {
    type Left = ChangeContainer;
    type Right = ChangeContainer;
    type Output = ChangeContainer;

    fn left_only(&mut self, first: ChangeContainer) -> Option<ChangeContainer> {
        Some(first)
    }

    fn right_only(&mut self, second: ChangeContainer) -> Option<ChangeContainer> {
        Some(second)
    }

    fn matched(&mut self, first: ChangeContainer, second: ChangeContainer) -> Option<ChangeContainer> {
        let keep_first = self
            .method
            .keeps_first(first.entity().timestamp(), second.entity().timestamp());
        Some(if keep_first { first } else { second })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::test_harness::run_merge;
    use osmflow_core::{
        ChangeAction,
        test_support::{change, node, node_at},
    };
    use rstest::rstest;

    #[rstest]
    fn later_change_wins_under_timestamp_policy() {
        let older = change(ChangeAction::Modify, node_at(4, 2, 10));
        let newer = change(ChangeAction::Delete, node_at(4, 3, 20));
        let output = run_merge(ChangeMerger::default(), vec![newer.clone()], vec![older])
            .expect("merge succeeds");
        assert_eq!(output, vec![newer]);
    }

    #[rstest]
    fn second_stream_wins_under_latest_source_policy() {
        let first = change(ChangeAction::Modify, node_at(4, 3, 20));
        let second = change(ChangeAction::Modify, node_at(4, 2, 10));
        let output = run_merge(
            ChangeMerger::new(ConflictResolutionMethod::LatestSource),
            vec![first],
            vec![second.clone()],
        )
        .expect("merge succeeds");
        assert_eq!(output, vec![second]);
    }

    #[rstest]
    fn disjoint_streams_interleave() {
        let output = run_merge(
            ChangeMerger::default(),
            vec![change(ChangeAction::Create, node(1, 1)), change(ChangeAction::Create, node(3, 1))],
            vec![change(ChangeAction::Delete, node(2, 4))],
        )
        .expect("merge succeeds");
        let ids: Vec<i64> = output.iter().map(|record| record.entity().id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
