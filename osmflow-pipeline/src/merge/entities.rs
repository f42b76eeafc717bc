//! Merge two element snapshots covering overlapping data.

use osmflow_core::{Entity, EntityContainer};

use super::{ConflictResolutionMethod, MergeJoin};

/// Joins two element streams, resolving elements present on both sides with
/// a [`ConflictResolutionMethod`].
///
/// When both inputs carry a bound, the output bound covers both rectangles
/// and keeps the winning side's origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityMerger {
    method: ConflictResolutionMethod,
}

impl EntityMerger {
    /// A merger resolving conflicts with `method`.
    #[must_use]
    pub const fn new(method: ConflictResolutionMethod) -> Self {
        Self { method }
    }

    /// The conflict policy in force.
    #[must_use]
    pub const fn method(&self) -> ConflictResolutionMethod {
        self.method
    }
}

impl MergeJoin for EntityMerger {
    type Left = EntityContainer;
    type Right = EntityContainer;
    type Output = EntityContainer;

    fn left_only(&mut self, first: EntityContainer) -> Option<EntityContainer> {
        Some(first)
    }

    fn right_only(&mut self, second: EntityContainer) -> Option<EntityContainer> {
        Some(second)
    }

    fn matched(&mut self, first: EntityContainer, second: EntityContainer) -> Option<EntityContainer> {
        let keep_first = self
            .method
            .keeps_first(first.timestamp(), second.timestamp());
        if let (Entity::Bound(a), Entity::Bound(b)) = (first.entity(), second.entity()) {
            let merged = if keep_first { a.union(b) } else { b.union(a) };
            return Some(EntityContainer::new(Entity::Bound(merged)));
        }
        Some(if keep_first { first } else { second })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::test_harness::run_merge;
    use geo::Coord;
    use osmflow_core::test_support::{bound, node, node_at, way};
    use rstest::rstest;

    #[rstest]
    #[case::second_is_newer(ConflictResolutionMethod::Timestamp, 10, 20, true)]
    #[case::first_is_newer(ConflictResolutionMethod::Timestamp, 20, 10, false)]
    #[case::tie_goes_to_second(ConflictResolutionMethod::Timestamp, 15, 15, true)]
    #[case::latest_source_ignores_time(ConflictResolutionMethod::LatestSource, 20, 10, true)]
    fn resolves_shared_identifiers(
        #[case] method: ConflictResolutionMethod,
        #[case] first_secs: i64,
        #[case] second_secs: i64,
        #[case] second_wins: bool,
    ) {
        let first = node_at(5, 1, first_secs);
        let second = node_at(5, 2, second_secs);
        let output = run_merge(EntityMerger::new(method), vec![first.clone()], vec![second.clone()])
            .expect("merge succeeds");
        let expected = if second_wins { second } else { first };
        assert_eq!(output, vec![expected]);
    }

    #[rstest]
    fn one_sided_elements_pass_through_in_order() {
        let output = run_merge(
            EntityMerger::default(),
            vec![node(1, 1), node(3, 1), way(2, 1, &[])],
            vec![node(2, 1), way(1, 1, &[])],
        )
        .expect("merge succeeds");
        assert_eq!(
            output,
            vec![node(1, 1), node(2, 1), node(3, 1), way(1, 1, &[]), way(2, 1, &[])]
        );
    }

    #[rstest]
    fn bounds_on_both_sides_are_unioned() {
        let output = run_merge(
            EntityMerger::new(ConflictResolutionMethod::LatestSource),
            vec![bound(0.0, 0.0, 1.0, 1.0)],
            vec![bound(2.0, -1.0, 3.0, 0.5)],
        )
        .expect("merge succeeds");
        let [merged] = output.as_slice() else {
            panic!("expected exactly one bound, got {output:?}");
        };
        let Entity::Bound(merged) = merged.entity() else {
            panic!("expected a bound, got {merged:?}");
        };
        assert_eq!(merged.rect.min(), Coord { x: 0.0, y: -1.0 });
        assert_eq!(merged.rect.max(), Coord { x: 3.0, y: 1.0 });
    }
}
