//! Element kinds and change actions.
//!
//! Both enums are closed: every consumer matches them exhaustively, so adding a
//! kind or an action is a compile-time event rather than a runtime surprise.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// The four OpenStreetMap element kinds, declared in canonical rank order.
///
/// The derived `Ord` follows declaration order, so
/// `Bound < Node < Way < Relation`.
///
/// # Examples
/// ```
/// use osmflow_core::EntityKind;
///
/// assert!(EntityKind::Bound < EntityKind::Node);
/// assert!(EntityKind::Way < EntityKind::Relation);
/// assert_eq!(EntityKind::Way.rank(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntityKind {
    /// Bounding box of a dataset.
    Bound,
    /// A single point.
    Node,
    /// An ordered list of node references.
    Way,
    /// A grouping of other elements.
    Relation,
}

impl EntityKind {
    /// All kinds in rank order.
    pub const ALL: [Self; 4] = [Self::Bound, Self::Node, Self::Way, Self::Relation];

    /// Position of the kind in the canonical ordering.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Bound => 0,
            Self::Node => 1,
            Self::Way => 2,
            Self::Relation => 3,
        }
    }

    /// Lowercase name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bound => "bound",
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name an [`EntityKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised element kind `{value}`")]
pub struct ParseKindError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for EntityKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseKindError {
                value: s.to_owned(),
            })
    }
}

/// What a change record does to its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChangeAction {
    /// The element is new.
    Create,
    /// The element replaces an existing version.
    Modify,
    /// The element is removed.
    Delete,
}

impl ChangeAction {
    /// All actions in application order.
    pub const ALL: [Self; 3] = [Self::Create, Self::Modify, Self::Delete];

    /// Lowercase name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }

    /// Whether applying the action leaves the element present.
    #[must_use]
    pub const fn retains_element(self) -> bool {
        matches!(self, Self::Create | Self::Modify)
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`ChangeAction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised change action `{value}`")]
pub struct ParseActionError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for ChangeAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseActionError {
                value: s.to_owned(),
            })
    }
}
