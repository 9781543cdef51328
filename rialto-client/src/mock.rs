//! A scripted in-memory domain client for testing.
//!
//! Queries and invocations pop pre-queued results. Submits are answered by an
//! optional responder closure; without one every entry is accepted and echoes
//! its current state back as the server state.

use async_trait::async_trait;
use parking_lot::Mutex;
use rialto_model::EntityType;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::changeset::{ChangeSetEntry, EntityChangeSet};
use crate::client::{
    DomainClient, DomainClientFactory, EntityTypeList, InvokeCompletedResult,
    QueryCompletedResult, SubmitCompletedResult,
};
use crate::error::{ClientError, ClientResult};
use crate::query::{EntityQuery, InvokeArgs};

type SubmitResponder =
    Box<dyn Fn(&EntityChangeSet) -> ClientResult<Vec<ChangeSetEntry>> + Send + Sync>;

/// A domain client answering from scripted queues.
pub struct MockDomainClient {
    types: EntityTypeList,
    supports_cancellation: bool,
    delay: Option<Duration>,
    query_results: Mutex<VecDeque<ClientResult<QueryCompletedResult>>>,
    invoke_results: Mutex<VecDeque<ClientResult<InvokeCompletedResult>>>,
    submit_responder: Mutex<Option<SubmitResponder>>,
    queries: Mutex<Vec<EntityQuery>>,
    invocations: Mutex<Vec<InvokeArgs>>,
    submit_count: AtomicUsize,
}

impl MockDomainClient {
    /// Creates a client serving the given entity types.
    #[must_use]
    pub fn new(types: Vec<Arc<EntityType>>) -> Self {
        let list = EntityTypeList::new();
        // A fresh list is always unset.
        let _ = list.set(types);
        Self {
            types: list,
            supports_cancellation: false,
            delay: None,
            query_results: Mutex::new(VecDeque::new()),
            invoke_results: Mutex::new(VecDeque::new()),
            submit_responder: Mutex::new(None),
            queries: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
            submit_count: AtomicUsize::new(0),
        }
    }

    /// Honours cancellation tokens.
    #[must_use]
    pub fn with_cancellation(mut self) -> Self {
        self.supports_cancellation = true;
        self
    }

    /// Delays every call, so tests can cancel or overlap them.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_query_result(&self, result: QueryCompletedResult) {
        self.query_results.lock().push_back(Ok(result));
    }

    pub fn push_query_error(&self, error: ClientError) {
        self.query_results.lock().push_back(Err(error));
    }

    pub fn push_invoke_result(&self, result: InvokeCompletedResult) {
        self.invoke_results.lock().push_back(Ok(result));
    }

    pub fn push_invoke_error(&self, error: ClientError) {
        self.invoke_results.lock().push_back(Err(error));
    }

    /// Answers submits with `responder` instead of accepting everything.
    pub fn respond_to_submit<F>(&self, responder: F)
    where
        F: Fn(&EntityChangeSet) -> ClientResult<Vec<ChangeSetEntry>> + Send + Sync + 'static,
    {
        *self.submit_responder.lock() = Some(Box::new(responder));
    }

    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }

    #[must_use]
    pub fn recorded_queries(&self) -> Vec<EntityQuery> {
        self.queries.lock().clone()
    }

    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn recorded_invocations(&self) -> Vec<InvokeArgs> {
        self.invocations.lock().clone()
    }

    async fn pause(&self, cancel: Option<&CancellationToken>) -> ClientResult<()> {
        let cancel = cancel.filter(|_| self.supports_cancellation);
        if let Some(delay) = self.delay {
            match cancel {
                Some(token) => {
                    tokio::select! {
                        () = token.cancelled() => return Err(ClientError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
        match cancel {
            Some(token) if token.is_cancelled() => Err(ClientError::Cancelled),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for MockDomainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDomainClient")
            .field("types", &self.types.get().len())
            .field("supports_cancellation", &self.supports_cancellation)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

fn accept_all(change_set: &EntityChangeSet) -> Vec<ChangeSetEntry> {
    change_set
        .entries()
        .iter()
        .map(|entry| {
            let state = entry.current.clone();
            entry.clone().with_server_state(state)
        })
        .collect()
}

#[async_trait]
impl DomainClient for MockDomainClient {
    fn supports_cancellation(&self) -> bool {
        self.supports_cancellation
    }

    fn entity_type_list(&self) -> &EntityTypeList {
        &self.types
    }

    async fn query(
        &self,
        query: &EntityQuery,
        cancel: Option<CancellationToken>,
    ) -> ClientResult<QueryCompletedResult> {
        self.queries.lock().push(query.clone());
        self.pause(cancel.as_ref()).await?;
        self.query_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryCompletedResult::default()))
    }

    async fn submit(
        &self,
        change_set: Arc<EntityChangeSet>,
        cancel: Option<CancellationToken>,
    ) -> ClientResult<SubmitCompletedResult> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        debug!(entries = change_set.len(), "mock submit received");
        self.pause(cancel.as_ref()).await?;
        let results = match &*self.submit_responder.lock() {
            Some(responder) => responder(&change_set)?,
            None => accept_all(&change_set),
        };
        Ok(SubmitCompletedResult {
            change_set,
            results,
        })
    }

    async fn invoke(
        &self,
        args: &InvokeArgs,
        cancel: Option<CancellationToken>,
    ) -> ClientResult<InvokeCompletedResult> {
        self.invocations.lock().push(args.clone());
        self.pause(cancel.as_ref()).await?;
        self.invoke_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(InvokeCompletedResult::default()))
    }
}

/// A factory handing out one shared client regardless of endpoint.
///
/// Rejects non-https endpoints when a secure endpoint is required.
#[derive(Debug, Clone)]
pub struct MockClientFactory {
    client: Arc<MockDomainClient>,
}

impl MockClientFactory {
    #[must_use]
    pub fn new(client: Arc<MockDomainClient>) -> Self {
        Self { client }
    }
}

impl DomainClientFactory for MockClientFactory {
    fn create(
        &self,
        service_uri: &str,
        requires_secure_endpoint: bool,
    ) -> ClientResult<Arc<dyn DomainClient>> {
        if requires_secure_endpoint && !service_uri.starts_with("https://") {
            return Err(ClientError::InvalidOperation(format!(
                "service '{service_uri}' requires a secure endpoint"
            )));
        }
        Ok(self.client.clone())
    }
}
