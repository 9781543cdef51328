//! Core entity model for Rialto.
//!
//! Defines the types every other layer builds on:
//! - [`EntityType`]: metadata: key members, member kinds, associations, custom methods
//! - [`Value`] / [`ComplexObject`]: member values, including shared nested objects
//! - [`Entity`]: the change-tracked object and its state machine
//! - the apply-state merge engine used by loads, submits and conflict resolution
//! - [`EntityConflict`], [`ValidationResult`] and the [`EntityValidator`] hook
//!
//! Entities here know nothing about sets or containers; membership, identity
//! and associations are enforced by `rialto-tracking`.

mod conflict;
mod entity;
mod error;
mod merge;
mod metadata;
mod snapshot;
mod validation;
mod value;

pub use conflict::EntityConflict;
pub use entity::{Entity, EntityAction, property};
pub use error::{ModelError, ModelResult};
pub use metadata::{
    AssociationMetadata, CustomMethod, EntityType, MemberKind, MemberMetadata, Multiplicity,
    ParameterType,
};
pub use snapshot::{extract_state, value_state};
pub use validation::{
    EntityValidator, PermissiveValidator, RequiredMembersValidator, ValidationResult,
};
pub use value::{ComplexObject, ComplexRef, StateMap, Value};
