//! Domain context and asynchronous operations for Rialto.
//!
//! A [`DomainContext`] pairs an entity container with a domain client and
//! orchestrates the three kinds of service calls:
//! - loads: query, then merge results into the container
//! - submits: build, validate and send a change set, then apply the verdict
//! - invocations: call a service operation and decode its return value
//!
//! Each call is tracked by an [`Operation`] handle that completes once.

mod config;
mod context;
mod error;
mod operation;

pub use config::ContextConfig;
pub use context::DomainContext;
pub use error::{DomainError, DomainResult, OperationErrorStatus};
pub use operation::{
    CompletionCallback, InvokeOperation, InvokeResult, LoadOperation, LoadResult, Operation,
    OperationState, SubmitOperation, property,
};
