//! Task events consumed from the broker and inspection events published back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::codes::{InspectionEventType, TaskEventType};
use super::domain::Inspection;
use super::peers::Task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskEvent {
    pub r#type: TaskEventType,
    pub date: DateTime<Utc>,
    #[serde(rename = "UserID", default)]
    pub user_id: i64,
    pub task: Task,
}

/// State change of an inspection, carrying the row as stored after the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectionEvent {
    pub r#type: InspectionEventType,
    pub date: DateTime<Utc>,
    pub inspection: Inspection,
}

impl InspectionEvent {
    pub fn started(inspection: Inspection) -> Self {
        Self::new(InspectionEventType::Started, inspection)
    }

    pub fn finished(inspection: Inspection) -> Self {
        Self::new(InspectionEventType::Finished, inspection)
    }

    fn new(kind: InspectionEventType, inspection: Inspection) -> Self {
        Self {
            r#type: kind,
            date: Utc::now(),
            inspection,
        }
    }

    /// Partition key: events of one inspection stay ordered.
    pub fn key(&self) -> String {
        self.inspection.id.to_string()
    }
}

/// Outbound transport for inspection events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &InspectionEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Publisher used when no broker is configured; events only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &InspectionEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        info!(
            event_type = event.r#type.label(),
            inspection_id = event.inspection.id,
            task_id = event.inspection.task_id,
            %payload,
            "inspection event"
        );
        Ok(())
    }
}
