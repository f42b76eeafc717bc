//! Apply a change stream to a base element stream.

use log::{debug, trace};
use osmflow_core::{ChangeContainer, EntityContainer};

use super::MergeJoin;

/// Joins a base snapshot (left) with a change stream (right).
///
/// Creates and modifies replace or add the element; deletes remove it. A
/// delete of an absent element and a create of a present one are both
/// tolerated, so applying the same changes twice gives the same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeApplier;

impl ChangeApplier {
    fn apply(change: ChangeContainer) -> Option<EntityContainer> {
        let (action, element) = change.into_parts();
        if action.retains_element() {
            Some(element)
        } else {
            trace!("dropping {} ({action})", element.identity());
            None
        }
    }
}

impl MergeJoin for ChangeApplier {
    type Left = EntityContainer;
    type Right = ChangeContainer;
    type Output = EntityContainer;

    fn left_only(&mut self, base: EntityContainer) -> Option<EntityContainer> {
        Some(base)
    }

    fn right_only(&mut self, change: ChangeContainer) -> Option<EntityContainer> {
        if !change.action().retains_element() {
            debug!("ignoring {} of absent {}", change.action(), change.identity());
        }
        Self::apply(change)
    }

    fn matched(&mut self, _base: EntityContainer, change: ChangeContainer) -> Option<EntityContainer> {
        Self::apply(change)
    }
}
