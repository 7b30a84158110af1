use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use super::acts::format::file_timestamp;
use super::acts::{compose, ActError, ActInput, ActRenderer, ActTemplate, RenderError};
use super::codes::{AttachmentType, InspectionStatus};
use super::domain::{AttachPhotoRequest, Attachment, FinishInspectionRequest, Inspection};
use super::event_system::InspectionEventHandle;
use super::events::InspectionEvent;
use super::peers::{InspectionPeers, PeerError, UploadedFile};
use super::repository::{InspectionRepository, RepositoryError};

/// Inspection workflows over a repository, the peer services, an act renderer and the
/// event queue.
pub struct InspectionService<R> {
    pub(super) repository: Arc<R>,
    pub(super) peers: InspectionPeers,
    renderer: Arc<dyn ActRenderer>,
    pub(super) events: InspectionEventHandle,
}

impl<R> InspectionService<R>
where
    R: InspectionRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        peers: InspectionPeers,
        renderer: Arc<dyn ActRenderer>,
        events: InspectionEventHandle,
    ) -> Self {
        Self {
            repository,
            peers,
            renderer,
            events,
        }
    }

    pub fn events(&self) -> &InspectionEventHandle {
        &self.events
    }

    pub async fn get_all(&self) -> Result<Vec<Inspection>, InspectionServiceError> {
        self.repository
            .get_all()
            .await
            .map_err(repository_error("get all inspections"))
    }

    pub async fn get_by_task_id(&self, task_id: i64) -> Result<Inspection, InspectionServiceError> {
        self.repository
            .get_by_task_id(task_id)
            .await
            .map_err(repository_error("get inspection by task id"))
    }

    /// Verify a photo with the analyzer, store it and attach it to the inspection.
    #[instrument(
        skip(self, request),
        fields(
            inspection_id = request.inspection_id,
            attachment_type = request.r#type.label(),
            target_id = request.target_id
        )
    )]
    pub async fn attach_photo(
        &self,
        request: AttachPhotoRequest,
    ) -> Result<Attachment, InspectionServiceError> {
        let type_label = match request.r#type {
            AttachmentType::DevicePhoto => "прибор учета",
            AttachmentType::SealPhoto => "пломба",
            other => return Err(InspectionServiceError::InvalidAttachmentType(other.code())),
        };

        let analysis = self
            .peers
            .analyzer
            .process_image(&request.file_name, request.image.clone())
            .await
            .map_err(peer_error("process image"))?;

        if analysis.is_rejected() {
            warn!(
                is_blurred = analysis.is_blurred,
                has_error = analysis.has_error,
                blur_score = %analysis.blur_score,
                "photo rejected by analyzer"
            );
            return Err(InspectionServiceError::RejectedPhoto);
        }

        let object = match request.r#type {
            AttachmentType::DevicePhoto => self
                .peers
                .subscribers
                .get_object_by_device_id(request.target_id)
                .await
                .map_err(peer_error("get object by device id"))?,
            _ => self
                .peers
                .subscribers
                .get_object_by_seal_id(request.target_id)
                .await
                .map_err(peer_error("get object by seal id"))?,
        };

        let number = match request.r#type {
            AttachmentType::DevicePhoto => object.device_number(request.target_id),
            _ => object.seal_number(request.target_id),
        }
        .ok_or(InspectionServiceError::AttachmentTargetNotFound {
            kind: request.r#type.label(),
            id: request.target_id,
        })?;

        let file_name = format!(
            "{} - {} №{} от {}{}",
            object.address,
            type_label,
            number,
            file_timestamp(Utc::now()),
            extension(&request.file_name)
        );

        let uploaded = self
            .peers
            .files
            .upload(&file_name, request.image)
            .await
            .map_err(peer_error("upload file"))?;

        let attachment = self
            .repository
            .add_attachment(request.inspection_id, uploaded.id, request.r#type)
            .await
            .map_err(repository_error("add attachment"))?;

        info!(
            file_id = uploaded.id,
            attachment_id = attachment.id,
            "photo attached"
        );
        Ok(attachment)
    }

    /// Compose and upload the act, record readings and seals, and mark the inspection done.
    #[instrument(
        skip(self, request),
        fields(inspection_id = request.id, inspection_type = request.r#type.label())
    )]
    pub async fn finish_inspection(
        &self,
        request: FinishInspectionRequest,
    ) -> Result<UploadedFile, InspectionServiceError> {
        let inspection = self
            .repository
            .get_by_id(request.id)
            .await
            .map_err(repository_error("get inspection by id"))?;
        if inspection.status == InspectionStatus::Done {
            return Err(InspectionServiceError::AlreadyFinished(inspection.id));
        }

        let task = self
            .peers
            .tasks
            .get_task_by_id(inspection.task_id)
            .await
            .map_err(peer_error("get task by id"))?;
        let brigade_id = task
            .brigade_id
            .ok_or(InspectionServiceError::TaskHasNoBrigade(task.id))?;

        let brigade = self
            .peers
            .brigades
            .get_brigade_by_id(brigade_id)
            .await
            .map_err(peer_error("get brigade by id"))?;

        let contract = self
            .peers
            .subscribers
            .get_last_contract_by_object_id(task.object_id)
            .await
            .map_err(peer_error("get last contract by object id"))?;
        let primary_device_id = contract
            .object
            .primary_device()
            .map(|device| device.id)
            .ok_or(InspectionServiceError::NoDevices(task.object_id))?;

        let template = ActTemplate::for_type(request.r#type)?;
        let previous_readings = match template {
            ActTemplate::Universal => Vec::new(),
            ActTemplate::Control => self
                .repository
                .get_previous_device_readings(inspection.id, primary_device_id)
                .await
                .map_err(repository_error("get previous device readings"))?,
        };

        let now = Utc::now();
        let act = compose(ActInput {
            request: &request,
            brigade: &brigade,
            contract: &contract,
            previous_readings: &previous_readings,
            now,
        })?;
        let document = self.renderer.render(act.template, &act.fields)?;
        let act_name = act
            .template
            .file_name(inspection.id, now, &contract.object.address);

        let uploaded = self
            .peers
            .files
            .upload(&act_name, document)
            .await
            .map_err(peer_error("upload file"))?;

        self.repository
            .add_attachment(inspection.id, uploaded.id, AttachmentType::Act)
            .await
            .map_err(repository_error("add attachment"))?;

        self.repository
            .add_inspected_devices(inspection.id, &request.inspected_devices)
            .await
            .map_err(repository_error("add inspected devices"))?;

        let finished = self
            .repository
            .finish_inspection(&request)
            .await
            .map_err(repository_error("finish inspection"))?;

        info!(
            file_id = uploaded.id,
            template = act.template.label(),
            "inspection finished"
        );
        self.events.dispatch(InspectionEvent::finished(finished));

        Ok(uploaded)
    }
}

fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

pub(super) fn repository_error(
    context: &'static str,
) -> impl FnOnce(RepositoryError) -> InspectionServiceError {
    move |source| InspectionServiceError::Repository { context, source }
}

fn peer_error(context: &'static str) -> impl FnOnce(PeerError) -> InspectionServiceError {
    move |source| InspectionServiceError::Peer { context, source }
}

#[derive(Debug, thiserror::Error)]
pub enum InspectionServiceError {
    #[error("invalid attachment type: {0}")]
    InvalidAttachmentType(i32),
    #[error("photo rejected: image is blurred or could not be analyzed")]
    RejectedPhoto,
    #[error("{kind} {id} not found on the inspected object")]
    AttachmentTargetNotFound { kind: &'static str, id: i64 },
    #[error("inspection {0} is already finished")]
    AlreadyFinished(i64),
    #[error("task {0} has no brigade")]
    TaskHasNoBrigade(i64),
    #[error("no devices found for object {0}")]
    NoDevices(i64),
    #[error("invalid task status: {0}")]
    InvalidTaskStatus(i32),
    #[error("unknown task event type: {0}")]
    UnknownEventType(i32),
    #[error("failed to decode task event: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("generate act: {0}")]
    Act(#[from] ActError),
    #[error("render act: {0}")]
    Render(#[from] RenderError),
    #[error("{context}: {source}")]
    Repository {
        context: &'static str,
        #[source]
        source: RepositoryError,
    },
    #[error("{context}: {source}")]
    Peer {
        context: &'static str,
        #[source]
        source: PeerError,
    },
}

impl InspectionServiceError {
    /// Validation failures that no retry of the same input can fix.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAttachmentType(_)
                | Self::AttachmentTargetNotFound { .. }
                | Self::TaskHasNoBrigade(_)
                | Self::NoDevices(_)
                | Self::InvalidTaskStatus(_)
                | Self::UnknownEventType(_)
                | Self::Decode(_)
                | Self::Act(_)
        )
    }
}
