//! Asynchronous domain operations.
//!
//! An [`Operation`] is a cloneable handle shared by the caller and the task
//! driving the service call. It completes exactly once, as completed, failed
//! or cancelled. On completion the optional callback runs first, then every
//! Completed subscriber in registration order; failures are collected and
//! reported together once all of them ran.

use parking_lot::Mutex;
use rialto_client::{CancellationToken, EntityChangeSet, EntityQuery, InvokeArgs};
use rialto_model::ValidationResult;
use rialto_types::{
    AggregateError, EntityHandle, PropertyChanged, SubscriberError, Subscribers, SubscriptionId,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::{DomainError, DomainResult};

/// Property names raised by operations.
pub mod property {
    pub const IS_COMPLETE: &str = "is_complete";
    pub const HAS_ERROR: &str = "has_error";
    pub const IS_CANCELED: &str = "is_canceled";
    pub const CAN_CANCEL: &str = "can_cancel";
}

/// Callback run once when an operation completes, before any subscriber.
pub type CompletionCallback<Req, Res> =
    Box<dyn FnOnce(&Operation<Req, Res>) -> Result<(), SubscriberError> + Send>;

/// Lifecycle of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

struct Core<Req, Res> {
    state: OperationState,
    value: Option<Res>,
    error: Option<DomainError>,
    error_handled: bool,
    callback: Option<CompletionCallback<Req, Res>>,
    completed: Subscribers<Operation<Req, Res>>,
}

struct Inner<Req, Res> {
    request: Req,
    cancel: Option<CancellationToken>,
    core: Mutex<Core<Req, Res>>,
    property_changed: Mutex<Subscribers<PropertyChanged>>,
    done: Notify,
}

/// A pending or finished service call.
pub struct Operation<Req, Res> {
    inner: Arc<Inner<Req, Res>>,
}

impl<Req, Res> Clone for Operation<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Req, Res> Operation<Req, Res> {
    /// Creates a pending operation for `request`.
    ///
    /// Without a cancellation token the operation can never be cancelled.
    #[must_use]
    pub fn new(
        request: Req,
        cancel: Option<CancellationToken>,
        callback: Option<CompletionCallback<Req, Res>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                request,
                cancel,
                core: Mutex::new(Core {
                    state: OperationState::Pending,
                    value: None,
                    error: None,
                    error_handled: false,
                    callback,
                    completed: Subscribers::new(),
                }),
                property_changed: Mutex::new(Subscribers::new()),
                done: Notify::new(),
            }),
        }
    }

    /// What was sent to the service.
    pub fn request(&self) -> &Req {
        &self.inner.request
    }

    /// Token observed by the service call, if cancellation is supported.
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.inner.cancel.as_ref()
    }

    pub fn state(&self) -> OperationState {
        self.inner.core.lock().state
    }

    pub fn is_complete(&self) -> bool {
        self.state() != OperationState::Pending
    }

    pub fn has_error(&self) -> bool {
        self.state() == OperationState::Failed
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == OperationState::Cancelled
    }

    /// True while pending, when a token exists and was not fired yet.
    pub fn can_cancel(&self) -> bool {
        !self.is_complete()
            && self
                .inner
                .cancel
                .as_ref()
                .is_some_and(|token| !token.is_cancelled())
    }

    pub fn error(&self) -> Option<DomainError> {
        self.inner.core.lock().error.clone()
    }

    pub fn is_error_handled(&self) -> bool {
        self.inner.core.lock().error_handled
    }

    /// Acknowledges the error so completion does not report it.
    ///
    /// An error left unhandled on an operation driven in the background is
    /// logged at error level and returned by [`wait`](Self::wait). A caller
    /// that neither registers a callback nor waits only sees it in the logs.
    pub fn mark_error_as_handled(&self) {
        self.inner.core.lock().error_handled = true;
    }

    /// Entities the failure is attributed to; empty unless validation or
    /// conflicts failed the operation.
    pub fn entities_in_error(&self) -> Vec<EntityHandle> {
        self.inner
            .core
            .lock()
            .error
            .as_ref()
            .map(|e| e.entities_in_error().to_vec())
            .unwrap_or_default()
    }

    /// Requests cancellation of the service call.
    ///
    /// The operation completes as cancelled once the driver observes the
    /// token; a response already being merged runs to completion.
    pub fn cancel(&self) -> DomainResult<()> {
        if !self.can_cancel() {
            return Err(DomainError::InvalidOperation(
                "operation cannot be cancelled".into(),
            ));
        }
        if let Some(token) = &self.inner.cancel {
            token.cancel();
        }
        self.notify_property(property::CAN_CANCEL)
            .map_err(DomainError::Notification)
    }

    /// Registers a property callback.
    ///
    /// Callbacks run while the operation's subscriber list is locked. They
    /// may read the operation but must not subscribe or unsubscribe on it.
    pub fn subscribe_property_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PropertyChanged) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.inner.property_changed.lock().subscribe(handler)
    }

    pub fn unsubscribe_property_changed(&self, id: SubscriptionId) -> bool {
        self.inner.property_changed.lock().unsubscribe(id)
    }

    /// Registers a Completed subscriber. On an operation that already
    /// completed the subscriber runs immediately and its failure is returned.
    pub fn subscribe_completed<F>(&self, handler: F) -> DomainResult<()>
    where
        F: Fn(&Operation<Req, Res>) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        {
            let mut core = self.inner.core.lock();
            if core.state == OperationState::Pending {
                core.completed.subscribe(handler);
                return Ok(());
            }
        }
        handler(self).map_err(|e| DomainError::Notification(AggregateError::new(vec![e.to_string()])))
    }

    // ── Completion ──────────────────────────────────────────────────

    /// Completes successfully with `value`.
    pub fn complete(&self, value: Res) -> DomainResult<()> {
        self.finish(OperationState::Completed, Some(value), None)
    }

    /// Completes as failed.
    pub fn complete_with_error(&self, error: DomainError) -> DomainResult<()> {
        self.finish(OperationState::Failed, None, Some(error))
    }

    pub fn complete_cancelled(&self) -> DomainResult<()> {
        self.finish(OperationState::Cancelled, None, None)
    }

    /// Returns subscriber failures first; otherwise the operation's error if
    /// nobody marked it handled.
    fn finish(
        &self,
        state: OperationState,
        value: Option<Res>,
        error: Option<DomainError>,
    ) -> DomainResult<()> {
        let cancellable = self.can_cancel();
        let (callback, completed) = {
            let mut core = self.inner.core.lock();
            if core.state != OperationState::Pending {
                return Err(DomainError::InvalidOperation(
                    "operation is already complete".into(),
                ));
            }
            core.state = state;
            core.value = value;
            core.error = error;
            (core.callback.take(), core.completed.take())
        };

        let mut failures = Vec::new();
        let mut changed = vec![property::IS_COMPLETE];
        match state {
            OperationState::Failed => changed.push(property::HAS_ERROR),
            OperationState::Cancelled => changed.push(property::IS_CANCELED),
            _ => {}
        }
        if cancellable {
            changed.push(property::CAN_CANCEL);
        }
        for name in changed {
            if let Err(e) = self.notify_property(name) {
                failures.push(e);
            }
        }

        if let Some(callback) = callback {
            if let Err(e) = callback(self) {
                failures.push(AggregateError::new(vec![e.to_string()]));
            }
        }
        if let Err(e) = completed.notify(self) {
            failures.push(e);
        }
        self.inner.done.notify_waiters();

        if let Some(aggregate) = AggregateError::combine(failures) {
            return Err(DomainError::Notification(aggregate));
        }
        match self.unhandled_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn unhandled_error(&self) -> Option<DomainError> {
        let core = self.inner.core.lock();
        if core.error_handled {
            None
        } else {
            core.error.clone()
        }
    }

    fn notify_property(&self, name: &str) -> Result<(), AggregateError> {
        self.inner
            .property_changed
            .lock()
            .notify(&PropertyChanged::new(name))
    }
}

impl<Req, Res: Clone> Operation<Req, Res> {
    /// The result, once completed successfully.
    pub fn value(&self) -> Option<Res> {
        self.inner.core.lock().value.clone()
    }

    /// Waits for completion.
    ///
    /// Failed operations return their error whether or not it was handled;
    /// cancelled ones return [`DomainError::Cancelled`].
    pub async fn wait(&self) -> DomainResult<Res> {
        loop {
            let notified = self.inner.done.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    fn outcome(&self) -> Option<DomainResult<Res>> {
        let core = self.inner.core.lock();
        match core.state {
            OperationState::Pending => None,
            OperationState::Completed => Some(core.value.clone().ok_or_else(|| {
                DomainError::InvalidOperation("completed operation has no value".into())
            })),
            OperationState::Failed => Some(Err(core
                .error
                .clone()
                .unwrap_or_else(|| DomainError::InvalidOperation("failed without an error".into())))),
            OperationState::Cancelled => Some(Err(DomainError::Cancelled)),
        }
    }
}

impl<Req: fmt::Debug, Res> fmt::Debug for Operation<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("Operation")
            .field("request", &self.inner.request)
            .field("state", &core.state)
            .field("error", &core.error)
            .field("cancellable", &self.inner.cancel.is_some())
            .finish_non_exhaustive()
    }
}

// ── Load ────────────────────────────────────────────────────────────

/// What a load merged into the container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    /// Top-level results, in response order.
    pub entities: Vec<EntityHandle>,
    /// Top-level results followed by included entities, each once.
    pub all_entities: Vec<EntityHandle>,
    pub total_count: Option<i64>,
    pub validation_errors: Vec<ValidationResult>,
}

pub type LoadOperation = Operation<EntityQuery, LoadResult>;

impl Operation<EntityQuery, LoadResult> {
    pub fn entities(&self) -> Vec<EntityHandle> {
        self.inner
            .core
            .lock()
            .value
            .as_ref()
            .map(|r| r.entities.clone())
            .unwrap_or_default()
    }

    pub fn all_entities(&self) -> Vec<EntityHandle> {
        self.inner
            .core
            .lock()
            .value
            .as_ref()
            .map(|r| r.all_entities.clone())
            .unwrap_or_default()
    }

    /// Count reported by the server, when the query asked for it.
    pub fn total_entity_count(&self) -> Option<i64> {
        self.inner
            .core
            .lock()
            .value
            .as_ref()
            .and_then(|r| r.total_count)
    }
}

// ── Submit ──────────────────────────────────────────────────────────

pub type SubmitOperation = Operation<Arc<EntityChangeSet>, Arc<EntityChangeSet>>;

impl Operation<Arc<EntityChangeSet>, Arc<EntityChangeSet>> {
    /// The submitted change set.
    pub fn change_set(&self) -> &Arc<EntityChangeSet> {
        self.request()
    }
}

// ── Invoke ──────────────────────────────────────────────────────────

/// Decoded result of a service operation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResult<T> {
    pub value: T,
    pub validation_errors: Vec<ValidationResult>,
}

pub type InvokeOperation<T> = Operation<InvokeArgs, InvokeResult<T>>;

impl<T: Clone> Operation<InvokeArgs, InvokeResult<T>> {
    pub fn return_value(&self) -> Option<T> {
        self.inner
            .core
            .lock()
            .value
            .as_ref()
            .map(|r| r.value.clone())
    }
}
