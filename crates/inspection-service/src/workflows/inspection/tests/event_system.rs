use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::workflows::inspection::domain::Inspection;
use crate::workflows::inspection::event_system::{EventSystemConfig, InspectionEventSystem};
use crate::workflows::inspection::events::InspectionEvent;

fn started(id: i64) -> InspectionEvent {
    InspectionEvent::started(Inspection::started(id, TASK_ID, at(2025, 1, 9, 7, 0)))
}

fn config(capacity: usize) -> EventSystemConfig {
    EventSystemConfig {
        channel_capacity: capacity,
        drain_timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    let publisher = Arc::new(RecordingPublisher::default());
    let (_system, handle) = InspectionEventSystem::new(publisher, config(1));

    assert!(handle.dispatch(started(1)));
    assert!(!handle.dispatch(started(2)));

    let stats = handle.stats();
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.capacity, 1);
}

#[tokio::test]
async fn queued_events_are_published_in_order_before_stop() {
    let publisher = Arc::new(RecordingPublisher::default());
    let (system, handle) = InspectionEventSystem::new(publisher.clone(), config(8));

    for id in 1..=3 {
        assert!(handle.dispatch(started(id)));
    }
    let task = tokio::spawn(system.run());

    let report = handle.shutdown().await;
    task.await.expect("event loop exits");

    assert!(report.success);
    let ids: Vec<i64> = publisher
        .events()
        .iter()
        .map(|event| event.inspection.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(handle.stats().published, 3);
    assert!(!handle.is_running());
}

#[tokio::test]
async fn publish_failures_are_counted_not_retried() {
    let publisher = Arc::new(RecordingPublisher::failing());
    let (system, handle) = InspectionEventSystem::new(publisher.clone(), config(8));
    let task = tokio::spawn(system.run());

    handle.dispatch(started(1));
    handle.shutdown().await;
    task.await.expect("event loop exits");

    let stats = handle.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.published, 0);
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn dispatch_after_stop_is_dropped() {
    let publisher = Arc::new(RecordingPublisher::default());
    let (system, handle) = InspectionEventSystem::new(publisher, config(8));
    drop(system);

    assert!(!handle.dispatch(started(1)));
    assert_eq!(handle.stats().dropped, 1);

    let report = handle.shutdown().await;
    assert!(!report.success);
}
