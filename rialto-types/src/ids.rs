//! Identifier types.
//!
//! Containers use UUID v7 ids; entities inside a container are addressed by a
//! monotonically allocated slot, so a handle stays valid for as long as the
//! entity remains attached.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an entity container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(Uuid);

impl ContainerId {
    /// Creates a new container ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a container ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidContainerId(e.to_string()))
    }
}

/// Address of an entity attached to a container.
///
/// Handles are never reused within a container: detaching an entity and
/// attaching it again yields a new slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle {
    container: ContainerId,
    slot: u64,
}

impl EntityHandle {
    /// Creates a handle for a slot in the given container.
    #[must_use]
    pub const fn new(container: ContainerId, slot: u64) -> Self {
        Self { container, slot }
    }

    /// The container that owns the entity.
    #[must_use]
    pub const fn container(&self) -> ContainerId {
        self.container
    }

    /// The slot within the container.
    #[must_use]
    pub const fn slot(&self) -> u64 {
        self.slot
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.container, self.slot)
    }
}

/// Client-assigned correlation id of a changeset entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Id of the entry at `index` in change set order.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u64)
    }

    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
