use std::sync::Arc;

use serde_json::json;

use super::common::*;
use crate::workflows::inspection::codes::{
    InspectionEventType, InspectionStatus, InspectionType, Resolution, TaskEventType, TaskStatus,
};
use crate::workflows::inspection::event_system::{EventSystemConfig, InspectionEventSystem};
use crate::workflows::inspection::events::TaskEvent;
use crate::workflows::inspection::repository::{InspectionRepository, RepositoryError};
use crate::workflows::inspection::service::{InspectionService, InspectionServiceError};

fn task_event(kind: TaskEventType, status: TaskStatus) -> TaskEvent {
    TaskEvent {
        r#type: kind,
        date: at(2025, 1, 9, 6, 0),
        user_id: 42,
        task: task(status),
    }
}

#[tokio::test]
async fn start_event_creates_inspection_and_publishes_started() {
    let harness = harness();

    harness
        .service
        .handle_task_event(task_event(TaskEventType::Start, TaskStatus::InWork))
        .await
        .expect("start is handled");

    let stored = harness
        .repository
        .get_by_task_id(TASK_ID)
        .await
        .expect("inspection created");
    assert_eq!(stored.status, InspectionStatus::InWork);
    assert_eq!(harness.repository.get_all().await.expect("lists").len(), 1);

    let events = harness.published().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].r#type, InspectionEventType::Started);
    assert_eq!(events[0].inspection.task_id, TASK_ID);
}

#[tokio::test]
async fn start_event_calls_the_store_once_and_publishes_once() {
    let repository = Arc::new(CountingRepository::default());
    let peers = Arc::new(ScriptedPeers::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let (system, events) =
        InspectionEventSystem::new(publisher.clone(), EventSystemConfig::default());
    let event_loop = tokio::spawn(system.run());
    let service = InspectionService::new(
        repository.clone(),
        peers.to_peers(),
        Arc::new(CapturingRenderer::default()),
        events.clone(),
    );

    service
        .handle_task_event(task_event(TaskEventType::Start, TaskStatus::InWork))
        .await
        .expect("start is handled");
    events.shutdown().await;
    event_loop.await.expect("event loop exits");

    assert_eq!(repository.starts(), vec![TASK_ID]);
    let published = publisher.events();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].r#type, InspectionEventType::Started);
    assert_eq!(
        published[0].inspection,
        repository
            .get_by_task_id(TASK_ID)
            .await
            .expect("inspection stored")
    );
}

#[tokio::test]
async fn start_with_unknown_status_never_reaches_the_store() {
    let repository = Arc::new(CountingRepository::default());
    let (_system, events) = InspectionEventSystem::new(
        Arc::new(RecordingPublisher::default()),
        EventSystemConfig::default(),
    );
    let service = InspectionService::new(
        repository.clone(),
        Arc::new(ScriptedPeers::default()).to_peers(),
        Arc::new(CapturingRenderer::default()),
        events.clone(),
    );

    let err = service
        .handle_task_event(task_event(TaskEventType::Start, TaskStatus::Unknown))
        .await
        .expect_err("unknown status cannot start");

    assert!(matches!(err, InspectionServiceError::InvalidTaskStatus(0)));
    assert!(repository.starts().is_empty());
    assert_eq!(events.stats().dispatched, 0);
}

#[tokio::test]
async fn repeated_start_reuses_the_same_row() {
    let harness = harness();
    for _ in 0..2 {
        harness
            .service
            .handle_task_event(task_event(TaskEventType::Start, TaskStatus::InWork))
            .await
            .expect("start is handled");
    }

    let all = harness.repository.get_all().await.expect("lists");
    assert_eq!(all.len(), 1);
    assert_eq!(harness.published().await.len(), 2);
}

#[tokio::test]
async fn start_requires_task_in_work() {
    let harness = harness();

    let err = harness
        .service
        .handle_task_event(task_event(TaskEventType::Start, TaskStatus::Done))
        .await
        .expect_err("done task cannot start");

    assert!(matches!(err, InspectionServiceError::InvalidTaskStatus(2)));
    assert!(harness.repository.get_all().await.expect("lists").is_empty());
    assert!(harness.published().await.is_empty());
}

#[tokio::test]
async fn add_and_finish_events_are_ignored() {
    let harness = harness();
    for kind in [TaskEventType::Add, TaskEventType::Finish] {
        harness
            .service
            .handle_task_event(task_event(kind, TaskStatus::InWork))
            .await
            .expect("no-op event");
    }

    assert!(harness.repository.get_all().await.expect("lists").is_empty());
    assert!(harness.published().await.is_empty());
}

#[tokio::test]
async fn unknown_event_type_is_an_error() {
    let harness = harness();
    let err = harness
        .service
        .handle_task_event(task_event(TaskEventType::Unknown, TaskStatus::InWork))
        .await
        .expect_err("type 0 is not handled");
    assert!(matches!(err, InspectionServiceError::UnknownEventType(0)));

    let err = harness
        .service
        .handle_task_event(task_event(TaskEventType::from(8), TaskStatus::InWork))
        .await
        .expect_err("type 8 is not handled");
    assert!(matches!(err, InspectionServiceError::UnknownEventType(8)));
    assert!(harness.repository.get_all().await.expect("lists").is_empty());
}

#[tokio::test]
async fn start_after_finish_conflicts() {
    let harness = harness_in_work();
    harness
        .service
        .finish_inspection(request(InspectionType::Limitation, Resolution::Limited))
        .await
        .expect("inspection finishes");

    let err = harness
        .service
        .handle_task_event(task_event(TaskEventType::Start, TaskStatus::InWork))
        .await
        .expect_err("done inspection stays done");

    assert!(matches!(
        err,
        InspectionServiceError::Repository {
            source: RepositoryError::Conflict(_),
            ..
        }
    ));
    let stored = harness.repository.get_by_id(1).await.expect("row exists");
    assert_eq!(stored.status, InspectionStatus::Done);
}

#[tokio::test]
async fn broker_payload_is_decoded_from_wire_names() {
    let harness = harness();
    let payload = json!({
        "Type": 2,
        "Date": "2025-01-09T06:00:00Z",
        "UserID": 42,
        "Task": {"ID": TASK_ID, "Status": 1, "BrigadeID": 3, "ObjectID": 100}
    });

    harness
        .service
        .handle_task_message(payload.to_string().as_bytes())
        .await;

    assert!(harness.repository.get_by_task_id(TASK_ID).await.is_ok());
    assert_eq!(harness.published().await.len(), 1);
}

#[tokio::test]
async fn malformed_payload_is_dropped() {
    let harness = harness();
    harness.service.handle_task_message(b"{not json").await;
    harness
        .service
        .handle_task_message(br#"{"Type": 2, "Date": "2025-01-09T06:00:00Z", "Task": {"ID": 7, "Status": 2}}"#)
        .await;

    assert!(harness.repository.get_all().await.expect("lists").is_empty());
    assert!(harness.published().await.is_empty());
}
