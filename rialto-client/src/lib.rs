//! The boundary between Rialto and a remote domain service.
//!
//! - [`DomainClient`]: the async contract a transport implements
//! - [`EntityQuery`] / [`InvokeArgs`]: what is sent
//! - [`EntityChangeSet`] / [`ChangeSetEntry`]: the unit of submission
//! - [`CancellationToken`]: cooperative cancellation of in-flight calls
//! - [`mock::MockDomainClient`]: a scripted in-memory client for tests
//!
//! Wire formats are deliberately absent; a transport owns its encoding.

mod cancel;
mod changeset;
mod client;
mod error;
pub mod mock;
mod query;

pub use cancel::CancellationToken;
pub use changeset::{ChangeSetEntry, ChangeSetItem, EntityChangeSet, EntityOperationType};
pub use client::{
    DomainClient, DomainClientFactory, EntityPayload, EntityTypeList, InvokeCompletedResult,
    QueryCompletedResult, SubmitCompletedResult,
};
pub use error::{ClientError, ClientResult};
pub use query::{EntityQuery, InvokeArgs};
