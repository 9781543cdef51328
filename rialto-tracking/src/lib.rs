//! Entity sets and containers for Rialto.
//!
//! An [`EntityContainer`] is a unit of work. It owns one [`EntitySet`] per
//! registered entity type and is the only way attached entities change:
//! - membership: add, attach, remove, re-add, detach
//! - identity: one attached non-new entity per key and type
//! - associations: entity refs and collections resolved by key predicates
//! - change sets: ordered snapshots of every pending change
//! - submit results: validation errors, conflicts, auto-sync and acceptance
//! - load merges: server payloads applied with a [`LoadBehavior`]
//!
//! [`LoadBehavior`]: rialto_types::LoadBehavior

mod association;
mod changeset;
mod container;
mod entity_set;
mod error;
mod load;
mod submit;
mod validation;

pub use container::{EntityContainer, HAS_CHANGES, SharedContainer};
pub use entity_set::{EntitySet, EntitySetOperations};
pub use error::{TrackingError, TrackingResult};
pub use load::MergedEntities;
pub use submit::SubmitOutcome;
