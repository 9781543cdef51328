use pretty_assertions::assert_eq;
use rialto_client::CancellationToken;
use rialto_context::{
    CompletionCallback, DomainError, Operation, OperationErrorStatus, OperationState, property,
};
use rialto_types::SubscriberError;
use std::sync::{Arc, Mutex};

type TestOperation = Operation<String, i32>;

fn make_op(callback: Option<CompletionCallback<String, i32>>) -> TestOperation {
    Operation::new("request".to_string(), None, callback)
}

fn make_cancellable_op() -> TestOperation {
    Operation::new("request".to_string(), Some(CancellationToken::new()), None)
}

fn server_error() -> DomainError {
    DomainError::Operation {
        status: OperationErrorStatus::ServerError,
        message: "boom".into(),
    }
}

#[test]
fn completion_is_single_shot() {
    let op = make_op(None);
    assert_eq!(op.state(), OperationState::Pending);

    op.complete(1).unwrap();
    assert!(op.is_complete());
    assert_eq!(op.value(), Some(1));

    assert!(matches!(op.complete(2), Err(DomainError::InvalidOperation(_))));
    assert!(matches!(
        op.complete_with_error(server_error()),
        Err(DomainError::InvalidOperation(_))
    ));
    assert!(matches!(op.complete_cancelled(), Err(DomainError::InvalidOperation(_))));
    assert_eq!(op.value(), Some(1));
    assert_eq!(op.state(), OperationState::Completed);
}

#[test]
fn callback_runs_before_subscribers() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&order);
    let op = make_op(Some(Box::new(
        move |_: &TestOperation| -> Result<(), SubscriberError> {
            seen.lock().unwrap().push("callback");
            Ok(())
        },
    )));
    for name in ["first", "second"] {
        let seen = Arc::clone(&order);
        op.subscribe_completed(move |_| {
            seen.lock().unwrap().push(name);
            Ok(())
        })
        .unwrap();
    }

    op.complete(7).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["callback", "first", "second"]);
}

#[test]
fn late_subscribers_run_immediately() {
    let op = make_op(None);
    op.complete(3).unwrap();

    let observed = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&observed);
    op.subscribe_completed(move |op| {
        *slot.lock().unwrap() = op.value();
        Ok(())
    })
    .unwrap();
    assert_eq!(*observed.lock().unwrap(), Some(3));

    let failed = op.subscribe_completed(|_| Err("late failure".into()));
    assert!(matches!(failed, Err(DomainError::Notification(_))));
}

#[test]
fn subscriber_failures_are_aggregated_after_all_ran() {
    let op = make_op(None);
    let ran = Arc::new(Mutex::new(0));
    op.subscribe_completed(|_| Err("first failed".into())).unwrap();
    let counter = Arc::clone(&ran);
    op.subscribe_completed(move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    })
    .unwrap();
    op.subscribe_completed(|_| Err("third failed".into())).unwrap();

    let Err(DomainError::Notification(aggregate)) = op.complete(1) else {
        panic!("expected aggregated subscriber failures");
    };
    assert_eq!(aggregate.messages(), &["first failed", "third failed"]);
    assert_eq!(*ran.lock().unwrap(), 1);
    assert_eq!(op.value(), Some(1));
}

#[test]
fn unhandled_errors_are_returned_from_completion() {
    let op = make_op(None);
    let result = op.complete_with_error(server_error());
    assert_eq!(result, Err(server_error()));
    assert!(op.has_error());
    assert!(!op.is_error_handled());
    assert_eq!(op.error(), Some(server_error()));
}

#[test]
fn errors_handled_by_the_callback_are_not_returned() {
    let op = make_op(Some(Box::new(
        |op: &TestOperation| -> Result<(), SubscriberError> {
            op.mark_error_as_handled();
            Ok(())
        },
    )));
    assert_eq!(op.complete_with_error(server_error()), Ok(()));
    assert!(op.is_error_handled());
}

#[test]
fn errors_handled_by_a_subscriber_are_not_returned() {
    let op = make_op(None);
    op.subscribe_completed(|op| {
        op.mark_error_as_handled();
        Ok(())
    })
    .unwrap();
    assert_eq!(op.complete_with_error(server_error()), Ok(()));
}

#[test]
fn cancel_requires_a_token() {
    let op = make_op(None);
    assert!(!op.can_cancel());
    assert!(matches!(op.cancel(), Err(DomainError::InvalidOperation(_))));
}

#[test]
fn cancel_fires_the_token_once() {
    let op = make_cancellable_op();
    assert!(op.can_cancel());

    op.cancel().unwrap();
    assert!(op.cancellation_token().unwrap().is_cancelled());
    assert!(!op.can_cancel());
    assert!(op.cancel().is_err());

    op.complete_cancelled().unwrap();
    assert!(op.is_canceled());
    assert!(!op.has_error());
}

#[test]
fn completed_operations_cannot_be_cancelled() {
    let op = make_cancellable_op();
    op.complete(1).unwrap();
    assert!(!op.can_cancel());
    assert!(matches!(op.cancel(), Err(DomainError::InvalidOperation(_))));
}

#[test]
fn completion_raises_property_changes() {
    let op = make_cancellable_op();
    let names = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&names);
    op.subscribe_property_changed(move |event| {
        seen.lock().unwrap().push(event.property.clone());
        Ok(())
    });

    let _ = op.complete_with_error(server_error());
    assert_eq!(
        *names.lock().unwrap(),
        vec![
            property::IS_COMPLETE.to_string(),
            property::HAS_ERROR.to_string(),
            property::CAN_CANCEL.to_string(),
        ]
    );
}

#[test]
fn entities_in_error_follow_the_error() {
    let op = make_op(None);
    assert!(op.entities_in_error().is_empty());
    let handle = rialto_types::EntityHandle::new(rialto_types::ContainerId::new(), 4);
    let _ = op.complete_with_error(DomainError::Conflicts {
        entities: vec![handle],
    });
    assert_eq!(op.entities_in_error(), vec![handle]);
}

#[tokio::test]
async fn wait_resolves_when_another_task_completes() {
    let op = make_op(None);
    let driver = op.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        driver.complete(11).unwrap();
    });
    assert_eq!(op.wait().await, Ok(11));
}

#[tokio::test]
async fn wait_reports_failures_and_cancellation() {
    let failed = make_op(Some(Box::new(
        |op: &TestOperation| -> Result<(), SubscriberError> {
            op.mark_error_as_handled();
            Ok(())
        },
    )));
    failed.complete_with_error(server_error()).unwrap();
    assert_eq!(failed.wait().await, Err(server_error()));

    let cancelled = make_cancellable_op();
    cancelled.complete_cancelled().unwrap();
    assert_eq!(cancelled.wait().await, Err(DomainError::Cancelled));
}

#[test]
fn property_handlers_can_read_the_operation() {
    let op = make_op(None);
    let observed = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&observed);
    let reader = op.clone();
    op.subscribe_property_changed(move |event| {
        seen.lock().unwrap().push((
            event.property.clone(),
            reader.is_complete(),
            reader.has_error(),
            reader.error().is_some(),
        ));
        Ok(())
    });

    let _ = op.complete_with_error(server_error());
    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 2);
    assert!(observed.iter().all(|(_, complete, failed, error)| *complete && *failed && *error));
}

#[tokio::test]
async fn unhandled_background_errors_reach_wait() {
    let op = make_op(None);
    let driver = op.clone();
    let completion = tokio::spawn(async move { driver.complete_with_error(server_error()) })
        .await
        .unwrap();
    assert_eq!(completion, Err(server_error()));
    assert!(!op.is_error_handled());
    assert_eq!(op.wait().await, Err(server_error()));
    assert_eq!(op.error(), Some(server_error()));
}
