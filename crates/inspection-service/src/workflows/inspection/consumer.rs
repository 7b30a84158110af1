//! Task lifecycle events from the broker.
//!
//! Every failure is logged and the message dropped; nothing is redelivered from here.

use tracing::{debug, error, info, instrument};

use super::codes::{TaskEventType, TaskStatus};
use super::events::{InspectionEvent, TaskEvent};
use super::peers::Task;
use super::repository::InspectionRepository;
use super::service::{repository_error, InspectionService, InspectionServiceError};

impl<R> InspectionService<R>
where
    R: InspectionRepository + 'static,
{
    /// Broker entry point: decode and handle one payload, logging any failure.
    pub async fn handle_task_message(&self, payload: &[u8]) {
        let event: TaskEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, "failed to decode task event, dropping message");
                return;
            }
        };

        let event_type = event.r#type;
        if let Err(err) = self.handle_task_event(event).await {
            error!(
                event_type = event_type.code(),
                error = %err,
                "failed to handle task event, dropping message"
            );
        }
    }

    #[instrument(
        skip(self, event),
        fields(event_type = event.r#type.label(), task_id = event.task.id, user_id = event.user_id)
    )]
    pub async fn handle_task_event(&self, event: TaskEvent) -> Result<(), InspectionServiceError> {
        match event.r#type {
            TaskEventType::Add => {
                debug!("task added, nothing to do");
                Ok(())
            }
            TaskEventType::Start => self.start_inspection(&event.task).await,
            TaskEventType::Finish => {
                debug!("task finished, nothing to do");
                Ok(())
            }
            TaskEventType::Unknown | TaskEventType::Unrecognized(_) => Err(
                InspectionServiceError::UnknownEventType(event.r#type.code()),
            ),
        }
    }

    async fn start_inspection(&self, task: &Task) -> Result<(), InspectionServiceError> {
        if task.status != TaskStatus::InWork {
            return Err(InspectionServiceError::InvalidTaskStatus(task.status.code()));
        }

        let inspection = self
            .repository
            .start_inspection(task.id)
            .await
            .map_err(repository_error("start inspection"))?;

        info!(inspection_id = inspection.id, "inspection started");
        self.events.dispatch(InspectionEvent::started(inspection));
        Ok(())
    }
}
