//! The domain context: one container, one client, and the operations that
//! move entities between them.

use rialto_client::{
    CancellationToken, ChangeSetEntry, ClientError, DomainClient, DomainClientFactory,
    EntityChangeSet, EntityPayload, EntityQuery, InvokeArgs,
};
use rialto_model::{EntityValidator, PermissiveValidator, ValidationResult};
use rialto_tracking::{
    EntityContainer, MergedEntities, SharedContainer, SubmitOutcome, TrackingResult,
};
use rialto_types::{LoadBehavior, SubscriberError};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

use crate::config::ContextConfig;
use crate::error::{DomainError, DomainResult};
use crate::operation::{
    CompletionCallback, InvokeOperation, InvokeResult, LoadOperation, LoadResult, Operation,
    SubmitOperation,
};

#[derive(Debug, Default)]
struct ContextState {
    active_loads: AtomicUsize,
    submitting: AtomicBool,
}

/// Client-side unit of work against one domain service.
///
/// Loads, submits and invocations return an [`Operation`] immediately and
/// run on the ambient tokio runtime. Entity mutation happens under the
/// container lock and never across an await.
#[derive(Clone)]
pub struct DomainContext {
    client: Arc<dyn DomainClient>,
    container: SharedContainer,
    config: ContextConfig,
    validator: Arc<dyn EntityValidator>,
    state: Arc<ContextState>,
}

impl DomainContext {
    /// Creates a context whose client comes from `factory`.
    pub fn new(factory: &dyn DomainClientFactory, config: ContextConfig) -> DomainResult<Self> {
        let client = factory.create(&config.service_uri, config.requires_secure_endpoint)?;
        Self::with_client(client, config)
    }

    /// Creates a context around an existing client. One entity set is
    /// registered per entity type the client serves.
    pub fn with_client(client: Arc<dyn DomainClient>, config: ContextConfig) -> DomainResult<Self> {
        let container = EntityContainer::with_types(client.entity_types().iter().cloned())?;
        debug!(
            container = %container.id(),
            service = %config.service_uri,
            types = client.entity_types().len(),
            "domain context created"
        );
        Ok(Self {
            client,
            container: container.into_shared(),
            config,
            validator: Arc::new(PermissiveValidator),
            state: Arc::new(ContextState::default()),
        })
    }

    /// Replaces the validator run before submits and invocations.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn EntityValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn DomainClient> {
        &self.client
    }

    /// The shared container. Container notifications run under its lock, so
    /// subscribers must not call methods of this context that lock it.
    pub fn container(&self) -> &SharedContainer {
        &self.container
    }

    /// True while at least one load is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.active_loads.load(Ordering::SeqCst) > 0
    }

    pub fn is_submitting(&self) -> bool {
        self.state.submitting.load(Ordering::SeqCst)
    }

    pub fn has_changes(&self) -> bool {
        self.container.lock().has_changes()
    }

    /// Reverts every pending change in the container.
    pub fn reject_changes(&self) -> DomainResult<()> {
        self.container.lock().reject_changes()?;
        Ok(())
    }

    fn cancellation_token(&self) -> Option<CancellationToken> {
        self.client
            .supports_cancellation()
            .then(CancellationToken::new)
    }

    // ── Load ────────────────────────────────────────────────────────

    /// Starts a query merged with the configured load behaviour.
    pub fn load(&self, query: EntityQuery) -> LoadOperation {
        self.start_load(query, self.config.load_behavior, None)
    }

    /// Starts a query merged with `behavior`; `callback` runs on completion
    /// before any Completed subscriber.
    pub fn load_with<F>(&self, query: EntityQuery, behavior: LoadBehavior, callback: F) -> LoadOperation
    where
        F: FnOnce(&LoadOperation) -> Result<(), SubscriberError> + Send + 'static,
    {
        self.start_load(query, behavior, Some(Box::new(callback)))
    }

    /// Runs a query and waits for its merge.
    pub async fn load_async(&self, query: EntityQuery) -> DomainResult<LoadResult> {
        self.load(query).wait().await
    }

    fn start_load(
        &self,
        query: EntityQuery,
        behavior: LoadBehavior,
        callback: Option<CompletionCallback<EntityQuery, LoadResult>>,
    ) -> LoadOperation {
        let op = Operation::new(query, self.cancellation_token(), callback);
        let guard = LoadGuard::enter(&self.state);
        let client = Arc::clone(&self.client);
        let container = Arc::clone(&self.container);
        let driver = op.clone();

        tokio::spawn(async move {
            let result = run_load(client.as_ref(), &container, &driver, behavior).await;
            drop(guard);
            finish(&driver, result);
        });
        op
    }

    // ── Submit ──────────────────────────────────────────────────────

    /// Submits every pending change in the container.
    ///
    /// Fails immediately with [`DomainError::InvalidOperation`] while another
    /// submit of this context is in flight. An empty change set completes
    /// without contacting the service; one failing client-side validation
    /// completes as failed before any service call.
    pub fn submit_changes(&self) -> DomainResult<SubmitOperation> {
        self.start_submit(None)
    }

    pub fn submit_changes_with<F>(&self, callback: F) -> DomainResult<SubmitOperation>
    where
        F: FnOnce(&SubmitOperation) -> Result<(), SubscriberError> + Send + 'static,
    {
        self.start_submit(Some(Box::new(callback)))
    }

    pub async fn submit_changes_async(&self) -> DomainResult<Arc<EntityChangeSet>> {
        self.submit_changes()?.wait().await
    }

    fn start_submit(
        &self,
        callback: Option<CompletionCallback<Arc<EntityChangeSet>, Arc<EntityChangeSet>>>,
    ) -> DomainResult<SubmitOperation> {
        let guard = SubmitGuard::enter(&self.state)?;

        let (change_set, invalid) = {
            let mut container = self.container.lock();
            let change_set = container.get_changes()?;
            let invalid = if change_set.is_empty() {
                Vec::new()
            } else {
                container.validate_change_set(&change_set, self.validator.as_ref())?
            };
            (Arc::new(change_set), invalid)
        };

        let op = Operation::new(Arc::clone(&change_set), self.cancellation_token(), callback);
        if change_set.is_empty() {
            drop(guard);
            debug!("no pending changes to submit");
            finish(&op, Ok(change_set));
            return Ok(op);
        }
        if !invalid.is_empty() {
            drop(guard);
            warn!(entities = invalid.len(), "submit rejected by client-side validation");
            finish(
                &op,
                Err(DomainError::Validation {
                    entities: invalid,
                    errors: Vec::new(),
                }),
            );
            return Ok(op);
        }

        let marks = SubmittingMarks::enter(&self.container, &change_set)?;
        let client = Arc::clone(&self.client);
        let container = Arc::clone(&self.container);
        let driver = op.clone();

        tokio::spawn(async move {
            let result = run_submit(client.as_ref(), &container, &driver).await;
            drop(marks);
            drop(guard);
            finish(&driver, result);
        });
        Ok(op)
    }

    // ── Invoke ──────────────────────────────────────────────────────

    /// Invokes a service operation and decodes its return value as `T`.
    pub fn invoke_operation<T>(&self, args: InvokeArgs) -> InvokeOperation<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.start_invoke(args, None)
    }

    pub fn invoke_operation_with<T, F>(&self, args: InvokeArgs, callback: F) -> InvokeOperation<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce(&InvokeOperation<T>) -> Result<(), SubscriberError> + Send + 'static,
    {
        self.start_invoke(args, Some(Box::new(callback)))
    }

    pub async fn invoke_operation_async<T>(&self, args: InvokeArgs) -> DomainResult<InvokeResult<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.invoke_operation(args).wait().await
    }

    fn start_invoke<T>(
        &self,
        args: InvokeArgs,
        callback: Option<CompletionCallback<InvokeArgs, InvokeResult<T>>>,
    ) -> InvokeOperation<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let op = Operation::new(args, self.cancellation_token(), callback);
        let errors = self.validator.validate_method(
            None,
            &op.request().operation_name,
            &op.request().parameter_values(),
        );
        if !errors.is_empty() {
            warn!(operation = %op.request().operation_name, "invocation rejected by client-side validation");
            finish(
                &op,
                Err(DomainError::Validation {
                    entities: Vec::new(),
                    errors,
                }),
            );
            return op;
        }

        let client = Arc::clone(&self.client);
        let driver = op.clone();
        tokio::spawn(async move {
            let result = run_invoke(client.as_ref(), &driver).await;
            finish(&driver, result);
        });
        op
    }
}

impl std::fmt::Debug for DomainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainContext")
            .field("config", &self.config)
            .field("is_loading", &self.is_loading())
            .field("is_submitting", &self.is_submitting())
            .finish_non_exhaustive()
    }
}

// ── Drivers ─────────────────────────────────────────────────────────

async fn run_load(
    client: &dyn DomainClient,
    container: &SharedContainer,
    op: &LoadOperation,
    behavior: LoadBehavior,
) -> DomainResult<LoadResult> {
    let query = op.request();
    let response = client.query(query, op.cancellation_token().cloned()).await?;
    check_cancelled(op.cancellation_token())?;

    if response.entities.is_empty() && !response.validation_errors.is_empty() {
        warn!(query = %query.query_name, errors = response.validation_errors.len(), "load failed validation");
        return Err(DomainError::Validation {
            entities: Vec::new(),
            errors: response.validation_errors,
        });
    }

    let merged = merge(
        container,
        &response.entities,
        &response.included_entities,
        behavior,
    )?;
    info!(
        query = %query.query_name,
        entities = merged.entities.len(),
        all_entities = merged.all_entities.len(),
        "load completed"
    );
    Ok(LoadResult {
        entities: merged.entities,
        all_entities: merged.all_entities,
        total_count: response.total_count,
        validation_errors: response.validation_errors,
    })
}

fn merge(
    container: &SharedContainer,
    entities: &[EntityPayload],
    included: &[EntityPayload],
    behavior: LoadBehavior,
) -> TrackingResult<MergedEntities> {
    container.lock().merge_payloads(entities, included, behavior)
}

async fn run_submit(
    client: &dyn DomainClient,
    container: &SharedContainer,
    op: &SubmitOperation,
) -> DomainResult<Arc<EntityChangeSet>> {
    let change_set = op.change_set();
    let response = client
        .submit(Arc::clone(change_set), op.cancellation_token().cloned())
        .await?;
    check_cancelled(op.cancellation_token())?;

    let outcome = apply_results(container, change_set, &response.results)?;
    match outcome {
        SubmitOutcome::Accepted => {
            info!(
                added = change_set.added().len(),
                modified = change_set.modified().len(),
                removed = change_set.removed().len(),
                "submit completed"
            );
            Ok(Arc::clone(change_set))
        }
        SubmitOutcome::ValidationFailed(entities) => {
            let errors: Vec<ValidationResult> = response
                .results
                .iter()
                .flat_map(|entry| entry.validation_errors.iter().cloned())
                .collect();
            warn!(entities = entities.len(), "submit rejected by server validation");
            Err(DomainError::Validation { entities, errors })
        }
        SubmitOutcome::Conflicts(entities) => {
            warn!(entities = entities.len(), "submit rejected with conflicts");
            Err(DomainError::Conflicts { entities })
        }
    }
}

fn apply_results(
    container: &SharedContainer,
    change_set: &EntityChangeSet,
    results: &[ChangeSetEntry],
) -> TrackingResult<SubmitOutcome> {
    container.lock().apply_submit_results(change_set, results)
}

async fn run_invoke<T>(client: &dyn DomainClient, op: &InvokeOperation<T>) -> DomainResult<InvokeResult<T>>
where
    T: DeserializeOwned + Clone,
{
    let args = op.request();
    let response = client.invoke(args, op.cancellation_token().cloned()).await?;
    check_cancelled(op.cancellation_token())?;

    if !response.validation_errors.is_empty() {
        warn!(operation = %args.operation_name, errors = response.validation_errors.len(), "invocation failed validation");
        return Err(DomainError::Validation {
            entities: Vec::new(),
            errors: response.validation_errors,
        });
    }
    let value = serde_json::from_value(response.return_value)
        .map_err(ClientError::from)?;
    info!(operation = %args.operation_name, "invocation completed");
    Ok(InvokeResult {
        value,
        validation_errors: Vec::new(),
    })
}

fn check_cancelled(token: Option<&CancellationToken>) -> DomainResult<()> {
    if token.is_some_and(CancellationToken::is_cancelled) {
        Err(DomainError::Cancelled)
    } else {
        Ok(())
    }
}

/// Completes `op` from a driver result and logs what nobody handled.
fn finish<Req, Res>(op: &Operation<Req, Res>, result: DomainResult<Res>) {
    let completion = match result {
        Ok(value) => op.complete(value),
        Err(DomainError::Cancelled) => {
            debug!("operation cancelled");
            op.complete_cancelled()
        }
        Err(e) => op.complete_with_error(e),
    };
    if let Err(e) = completion {
        error!(error = %e, "domain operation failed");
    }
}

// ── Guards ──────────────────────────────────────────────────────────

struct LoadGuard(Arc<ContextState>);

impl LoadGuard {
    fn enter(state: &Arc<ContextState>) -> Self {
        state.active_loads.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(state))
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.0.active_loads.fetch_sub(1, Ordering::SeqCst);
    }
}

struct SubmitGuard(Arc<ContextState>);

impl SubmitGuard {
    fn enter(state: &Arc<ContextState>) -> DomainResult<Self> {
        if state.submitting.swap(true, Ordering::SeqCst) {
            return Err(DomainError::InvalidOperation(
                "a submit is already in progress".into(),
            ));
        }
        Ok(Self(Arc::clone(state)))
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.0.submitting.store(false, Ordering::SeqCst);
    }
}

/// Holds `is_submitting` on every entity of a change set until dropped.
struct SubmittingMarks {
    container: SharedContainer,
    change_set: Arc<EntityChangeSet>,
}

impl SubmittingMarks {
    fn enter(container: &SharedContainer, change_set: &Arc<EntityChangeSet>) -> DomainResult<Self> {
        let marks = Self {
            container: Arc::clone(container),
            change_set: Arc::clone(change_set),
        };
        container.lock().set_submitting(change_set, true)?;
        Ok(marks)
    }
}

impl Drop for SubmittingMarks {
    fn drop(&mut self) {
        if let Err(e) = self.container.lock().set_submitting(&self.change_set, false) {
            warn!(error = %e, "clearing is_submitting failed");
        }
    }
}
