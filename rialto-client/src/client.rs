//! The domain client contract.

use async_trait::async_trait;
use rialto_model::{EntityType, StateMap, ValidationResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::changeset::{ChangeSetEntry, EntityChangeSet};
use crate::error::{ClientError, ClientResult};
use crate::query::{EntityQuery, InvokeArgs};

/// Serialized state of one entity returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub entity_type: String,
    pub state: StateMap,
}

impl EntityPayload {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, state: StateMap) -> Self {
        Self {
            entity_type: entity_type.into(),
            state,
        }
    }
}

/// Response to [`DomainClient::query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryCompletedResult {
    pub entities: Vec<EntityPayload>,
    /// Related entities shipped alongside the primary results.
    #[serde(default)]
    pub included_entities: Vec<EntityPayload>,
    #[serde(default)]
    pub total_count: Option<i64>,
    #[serde(default)]
    pub validation_errors: Vec<ValidationResult>,
}

/// Response to [`DomainClient::submit`].
#[derive(Debug, Clone)]
pub struct SubmitCompletedResult {
    pub change_set: Arc<EntityChangeSet>,
    /// One entry per submitted entry, matched by id.
    pub results: Vec<ChangeSetEntry>,
}

/// Response to [`DomainClient::invoke`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeCompletedResult {
    #[serde(default)]
    pub return_value: serde_json::Value,
    #[serde(default)]
    pub validation_errors: Vec<ValidationResult>,
}

/// The entity types a client serves. Set once, then read-only.
#[derive(Debug, Default)]
pub struct EntityTypeList {
    types: OnceLock<Vec<Arc<EntityType>>>,
}

impl EntityTypeList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if the list was already set.
    pub fn set(&self, types: Vec<Arc<EntityType>>) -> ClientResult<()> {
        debug!(types = types.len(), "registering entity types");
        self.types
            .set(types)
            .map_err(|_| ClientError::InvalidOperation("entity types are already set".into()))
    }

    /// The registered types; empty until set.
    #[must_use]
    pub fn get(&self) -> &[Arc<EntityType>] {
        self.types.get().map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.types.get().is_some()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.get().iter().find(|ty| ty.name == name)
    }
}

/// A transport to a remote domain service.
///
/// The only suspension points of the tracking engine are these calls.
/// Implementations that support cancellation must observe the token they are
/// given and return [`ClientError::Cancelled`] when it fires.
#[async_trait]
pub trait DomainClient: Send + Sync {
    /// Whether calls honour cancellation tokens.
    fn supports_cancellation(&self) -> bool {
        false
    }

    /// Backing storage for the served entity types.
    fn entity_type_list(&self) -> &EntityTypeList;

    fn entity_types(&self) -> &[Arc<EntityType>] {
        self.entity_type_list().get()
    }

    fn set_entity_types(&self, types: Vec<Arc<EntityType>>) -> ClientResult<()> {
        self.entity_type_list().set(types)
    }

    /// Executes a query.
    async fn query(
        &self,
        query: &EntityQuery,
        cancel: Option<CancellationToken>,
    ) -> ClientResult<QueryCompletedResult>;

    /// Submits a change set and returns per-entry results.
    async fn submit(
        &self,
        change_set: Arc<EntityChangeSet>,
        cancel: Option<CancellationToken>,
    ) -> ClientResult<SubmitCompletedResult>;

    /// Invokes a service operation.
    async fn invoke(
        &self,
        args: &InvokeArgs,
        cancel: Option<CancellationToken>,
    ) -> ClientResult<InvokeCompletedResult>;
}

/// Creates clients for a service endpoint.
pub trait DomainClientFactory: Send + Sync {
    fn create(
        &self,
        service_uri: &str,
        requires_secure_endpoint: bool,
    ) -> ClientResult<Arc<dyn DomainClient>>;
}
