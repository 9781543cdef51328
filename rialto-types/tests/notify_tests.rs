use rialto_types::{
    AggregateError, CollectionChangeAction, CollectionChanged, PropertyChanged, Subscribers,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn subscribers_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut subs: Subscribers<PropertyChanged> = Subscribers::new();
    for i in 0..3 {
        let log = log.clone();
        subs.subscribe(move |e: &PropertyChanged| {
            log.lock().unwrap().push(format!("{i}:{}", e.property));
            Ok(())
        });
    }
    subs.notify(&PropertyChanged::new("Name")).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["0:Name", "1:Name", "2:Name"]);
}

#[test]
fn failing_subscriber_does_not_stop_later_ones() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut subs: Subscribers<PropertyChanged> = Subscribers::new();
    subs.subscribe(|_| Err("first failed".into()));
    let c = calls.clone();
    subs.subscribe(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    subs.subscribe(|_| Err("third failed".into()));

    let err = subs.notify(&PropertyChanged::new("x")).unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.messages(), ["first failed", "third failed"]);
    assert_eq!(err.to_string(), "2 subscriber(s) failed: first failed; third failed");
}

#[test]
fn unsubscribe_removes_handler() {
    let mut subs: Subscribers<PropertyChanged> = Subscribers::new();
    let id = subs.subscribe(|_| Err("boom".into()));
    assert_eq!(subs.len(), 1);
    assert!(subs.unsubscribe(id));
    assert!(!subs.unsubscribe(id));
    assert!(subs.notify(&PropertyChanged::new("x")).is_ok());
}

#[test]
fn take_empties_the_list() {
    let mut subs: Subscribers<CollectionChanged> = Subscribers::new();
    subs.subscribe(|_| Ok(()));
    let taken = subs.take();
    assert!(subs.is_empty());
    assert_eq!(taken.len(), 1);
}

#[test]
fn aggregate_combine() {
    assert!(AggregateError::combine(Vec::new()).is_none());
    let combined = AggregateError::combine(vec![
        AggregateError::new(vec!["a".into()]),
        AggregateError::new(vec!["b".into(), "c".into()]),
    ])
    .unwrap();
    assert_eq!(combined.messages(), ["a", "b", "c"]);
}

#[test]
fn collection_changed_constructors() {
    assert_eq!(CollectionChanged::reset().action, CollectionChangeAction::Reset);
    assert!(CollectionChanged::reset().handles.is_empty());
}
