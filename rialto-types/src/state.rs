//! Entity states and load behaviours.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Change-tracking state of an entity.
///
/// ```text
/// Detached ──add──> New ──accept──> Unmodified <──edit/revert──> Modified
///    ^               │                  │                            │
///    │               └──remove──> Detached                           │
///    │                                  └──remove──> Deleted <───────┘
///    └────────────── accept (Deleted) ─────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Not a member of any entity set.
    #[default]
    Detached,
    /// Added locally; the server has never seen it.
    New,
    /// Attached and identical to the last known server state.
    Unmodified,
    /// Attached with pending local edits.
    Modified,
    /// Marked for deletion; still attached until the submit is accepted.
    Deleted,
}

impl EntityState {
    /// Whether the entity is a member of an entity set.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !matches!(self, Self::Detached)
    }

    /// Whether the entity carries a change that would be submitted.
    #[must_use]
    pub fn has_pending_change(&self) -> bool {
        matches!(self, Self::New | Self::Modified | Self::Deleted)
    }

    /// Whether the state machine permits moving from `self` to `to`.
    #[must_use]
    pub fn can_transition_to(&self, to: EntityState) -> bool {
        use EntityState::*;
        matches!(
            (self, to),
            (Detached, New)
                | (Detached, Unmodified)
                | (New, Detached)
                | (New, Unmodified)
                | (Unmodified, Modified)
                | (Unmodified, Deleted)
                | (Unmodified, Detached)
                | (Modified, Unmodified)
                | (Modified, Deleted)
                | (Modified, Detached)
                | (Deleted, Unmodified)
                | (Deleted, Modified)
                | (Deleted, Detached)
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Detached => "detached",
            Self::New => "new",
            Self::Unmodified => "unmodified",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        };
        write!(f, "{label}")
    }
}

/// How incoming server values interact with values already held locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBehavior {
    /// Local values are authoritative; loads only resolve identity.
    #[default]
    KeepCurrent,
    /// Overwrite members the client has not changed since the original snapshot.
    MergeIntoCurrent,
    /// Overwrite every mergeable member and discard local edits.
    RefreshCurrent,
}
