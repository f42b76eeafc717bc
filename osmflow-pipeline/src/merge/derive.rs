//! Derive the change stream turning one snapshot into another.

use osmflow_core::{ChangeAction, ChangeContainer, EntityContainer};

use super::MergeJoin;

/// Joins a `from` snapshot (left) with a `to` snapshot (right).
///
/// Elements only in `from` become deletes, elements only in `to` become
/// creates, and elements in both become modifies carrying the `to` element
/// unless the two are structurally equal, in which case nothing is emitted.
/// Structural equality compares every field, so a re-tagged element with an
/// unchanged version still counts as modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDeriver;

impl MergeJoin for ChangeDeriver {
    type Left = EntityContainer;
    type Right = EntityContainer;
    type Output = ChangeContainer;

    fn left_only(&mut self, from: EntityContainer) -> Option<ChangeContainer> {
        Some(ChangeContainer::new(ChangeAction::Delete, from))
    }

    fn right_only(&mut self, to: EntityContainer) -> Option<ChangeContainer> {
        Some(ChangeContainer::new(ChangeAction::Create, to))
    }

    fn matched(&mut self, from: EntityContainer, to: EntityContainer) -> Option<ChangeContainer> {
        (from != to).then(|| ChangeContainer::new(ChangeAction::Modify, to))
    }
}
