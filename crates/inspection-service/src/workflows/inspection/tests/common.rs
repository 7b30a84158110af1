use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::workflows::inspection::acts::{ActFields, ActRenderer, ActTemplate, RenderError};
use crate::workflows::inspection::codes::{
    AttachmentType, DevicePlaceType, InspectionType, MethodBy, ReasonType, Resolution, TaskStatus,
};
use crate::workflows::inspection::domain::{
    Attachment, FinishInspectionRequest, InspectedDevice, InspectedDeviceRequest,
    InspectedSealRequest, Inspection,
};
use crate::workflows::inspection::event_system::{
    EventSystemConfig, InspectionEventHandle, InspectionEventSystem,
};
use crate::workflows::inspection::events::{EventPublisher, InspectionEvent, PublishError};
use crate::workflows::inspection::peers::{
    AnalyzerService, BrigadeService, FileService, InspectionPeers, PeerError, SubscriberService,
    TaskService,
};
use crate::workflows::inspection::peers::{
    Brigade, Contract, Device, ImageAnalysis, Inspector, Seal, SiteObject, Subscriber, Task,
    UploadedFile,
};
use crate::workflows::inspection::repository::{
    InMemoryInspectionRepository, InspectionRepository, RepositoryError,
};
use crate::workflows::inspection::service::InspectionService;

pub(super) const ADDRESS: &str = "г. Москва, ул. Ленина, д. 1";
pub(super) const DEVICE_ID: i64 = 11;
pub(super) const SEAL_ID: i64 = 21;
pub(super) const TASK_ID: i64 = 7;

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn inspector(id: i64, surname: &str, name: &str, patronymic: &str) -> Inspector {
    Inspector {
        id,
        surname: surname.to_string(),
        name: name.to_string(),
        patronymic: patronymic.to_string(),
        ..Inspector::default()
    }
}

pub(super) fn brigade() -> Brigade {
    Brigade {
        id: 3,
        inspectors: vec![
            inspector(1, "Иванов", "Иван", "Иванович"),
            inspector(2, "Петров", "Пётр", ""),
        ],
    }
}

pub(super) fn site_object() -> SiteObject {
    SiteObject {
        id: 100,
        address: ADDRESS.to_string(),
        have_automaton: true,
        subscriber: subscriber(),
        devices: vec![Device {
            id: DEVICE_ID,
            object_id: 100,
            r#type: "СЕ-101".to_string(),
            number: "0042".to_string(),
            place_type: DevicePlaceType::Flat,
            place_description: String::new(),
            seals: vec![Seal {
                id: SEAL_ID,
                device_id: DEVICE_ID,
                number: "S-21".to_string(),
                place: "клеммная крышка".to_string(),
            }],
        }],
    }
}

pub(super) fn subscriber() -> Subscriber {
    Subscriber {
        id: 50,
        account_number: "7700123".to_string(),
        surname: "Сидоров".to_string(),
        name: "Алексей".to_string(),
        patronymic: "Павлович".to_string(),
        phone_number: "+7 900 000-00-00".to_string(),
        ..Subscriber::default()
    }
}

pub(super) fn contract() -> Contract {
    Contract {
        id: 500,
        number: "Д-500".to_string(),
        subscriber: subscriber(),
        object: site_object(),
    }
}

pub(super) fn task(status: TaskStatus) -> Task {
    Task {
        id: TASK_ID,
        status,
        brigade_id: Some(3),
        object_id: 100,
        plan_visit_at: None,
    }
}

pub(super) fn request(kind: InspectionType, resolution: Resolution) -> FinishInspectionRequest {
    FinishInspectionRequest {
        id: 1,
        r#type: kind,
        resolution,
        limit_reason: None,
        method: "отключение автомата".to_string(),
        method_by: MethodBy::Inspector,
        reason_type: ReasonType::NotIntroduced,
        reason_description: None,
        is_restriction_checked: true,
        is_violation_detected: false,
        is_expense_available: false,
        violation_description: None,
        is_unauthorized_consumers: false,
        unauthorized_description: None,
        unauthorized_explanation: None,
        energy_action_at: at(2025, 1, 10, 8, 0),
        inspected_devices: vec![InspectedDeviceRequest {
            device_id: DEVICE_ID,
            value: Decimal::new(123_456, 3),
            consumption: Decimal::new(125, 1),
            inspected_seals: Some(vec![InspectedSealRequest {
                seal_id: SEAL_ID,
                is_broken: false,
            }]),
        }],
    }
}

/// Peer doubles with settable answers; uploads are recorded by file name.
pub(super) struct ScriptedPeers {
    pub analysis: Mutex<ImageAnalysis>,
    pub task: Mutex<Task>,
    pub brigade: Mutex<Brigade>,
    pub contract: Mutex<Contract>,
    pub uploads: Mutex<Vec<String>>,
}

impl Default for ScriptedPeers {
    fn default() -> Self {
        Self {
            analysis: Mutex::new(ImageAnalysis::default()),
            task: Mutex::new(task(TaskStatus::InWork)),
            brigade: Mutex::new(brigade()),
            contract: Mutex::new(contract()),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedPeers {
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().expect("uploads mutex poisoned").clone()
    }

    pub fn reject_photos(&self) {
        let mut analysis = self.analysis.lock().expect("analysis mutex poisoned");
        analysis.is_blurred = true;
        analysis.blur_score = "12.4".to_string();
    }

    pub fn to_peers(self: &Arc<Self>) -> InspectionPeers {
        InspectionPeers {
            analyzer: self.clone(),
            subscribers: self.clone(),
            files: self.clone(),
            tasks: self.clone(),
            brigades: self.clone(),
        }
    }
}

#[async_trait]
impl AnalyzerService for ScriptedPeers {
    async fn process_image(
        &self,
        file_name: &str,
        _image: Vec<u8>,
    ) -> Result<ImageAnalysis, PeerError> {
        let mut analysis = self.analysis.lock().expect("analysis mutex poisoned").clone();
        analysis.filename = file_name.to_string();
        Ok(analysis)
    }
}

#[async_trait]
impl SubscriberService for ScriptedPeers {
    async fn get_object_by_device_id(&self, _device_id: i64) -> Result<SiteObject, PeerError> {
        Ok(self.contract.lock().expect("contract mutex poisoned").object.clone())
    }

    async fn get_object_by_seal_id(&self, _seal_id: i64) -> Result<SiteObject, PeerError> {
        Ok(self.contract.lock().expect("contract mutex poisoned").object.clone())
    }

    async fn get_last_contract_by_object_id(
        &self,
        _object_id: i64,
    ) -> Result<Contract, PeerError> {
        Ok(self.contract.lock().expect("contract mutex poisoned").clone())
    }
}

#[async_trait]
impl FileService for ScriptedPeers {
    async fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<UploadedFile, PeerError> {
        let mut uploads = self.uploads.lock().expect("uploads mutex poisoned");
        uploads.push(file_name.to_string());
        Ok(UploadedFile {
            id: 900 + uploads.len() as i64,
            file_name: file_name.to_string(),
            file_size: content.len() as i64,
            bucket: "inspections".to_string(),
            url: format!("https://files.local/{}", uploads.len()),
        })
    }
}

#[async_trait]
impl TaskService for ScriptedPeers {
    async fn get_task_by_id(&self, _id: i64) -> Result<Task, PeerError> {
        Ok(self.task.lock().expect("task mutex poisoned").clone())
    }
}

#[async_trait]
impl BrigadeService for ScriptedPeers {
    async fn get_brigade_by_id(&self, _id: i64) -> Result<Brigade, PeerError> {
        Ok(self.brigade.lock().expect("brigade mutex poisoned").clone())
    }
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<InspectionEvent>>,
    failing: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<InspectionEvent> {
        self.events.lock().expect("events mutex poisoned").clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &InspectionEvent) -> Result<(), PublishError> {
        if self.failing {
            return Err(PublishError::Transport("broker down".to_string()));
        }
        self.events
            .lock()
            .expect("events mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Returns a fixed document and keeps every field map it was asked to render.
#[derive(Default)]
pub(super) struct CapturingRenderer {
    rendered: Mutex<Vec<(ActTemplate, ActFields)>>,
}

impl CapturingRenderer {
    pub fn rendered(&self) -> Vec<(ActTemplate, ActFields)> {
        self.rendered.lock().expect("renderer mutex poisoned").clone()
    }
}

impl ActRenderer for CapturingRenderer {
    fn render(&self, template: ActTemplate, fields: &ActFields) -> Result<Vec<u8>, RenderError> {
        self.rendered
            .lock()
            .expect("renderer mutex poisoned")
            .push((template, fields.clone()));
        Ok(b"PK-docx".to_vec())
    }
}

pub(super) struct Harness {
    pub service: Arc<InspectionService<InMemoryInspectionRepository>>,
    pub repository: Arc<InMemoryInspectionRepository>,
    pub peers: Arc<ScriptedPeers>,
    pub publisher: Arc<RecordingPublisher>,
    pub renderer: Arc<CapturingRenderer>,
    pub events: InspectionEventHandle,
    system: JoinHandle<()>,
}

impl Harness {
    /// Drain the event queue and return everything that reached the publisher.
    pub async fn published(self) -> Vec<InspectionEvent> {
        let report = self.events.shutdown().await;
        assert!(report.success, "event drain failed: {report:?}");
        self.system.await.expect("event system task panicked");
        self.publisher.events()
    }
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(InMemoryInspectionRepository::new());
    let peers = Arc::new(ScriptedPeers::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let renderer = Arc::new(CapturingRenderer::default());

    let (system, events) =
        InspectionEventSystem::new(publisher.clone(), EventSystemConfig::default());
    let system = tokio::spawn(system.run());

    let service = Arc::new(InspectionService::new(
        repository.clone(),
        peers.to_peers(),
        renderer.clone(),
        events.clone(),
    ));

    Harness {
        service,
        repository,
        peers,
        publisher,
        renderer,
        events,
        system,
    }
}

/// Harness with inspection 1 already in work for [`TASK_ID`].
pub(super) fn harness_in_work() -> Harness {
    let harness = harness();
    harness
        .repository
        .seed(Inspection::started(1, TASK_ID, at(2025, 1, 9, 7, 0)));
    harness
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is json")
}

/// Wraps the in-memory store and records every start transition it is asked for.
#[derive(Default)]
pub(super) struct CountingRepository {
    inner: InMemoryInspectionRepository,
    starts: Mutex<Vec<i64>>,
}

impl CountingRepository {
    pub fn starts(&self) -> Vec<i64> {
        self.starts.lock().expect("starts mutex poisoned").clone()
    }
}

#[async_trait]
impl InspectionRepository for CountingRepository {
    async fn get_all(&self) -> Result<Vec<Inspection>, RepositoryError> {
        self.inner.get_all().await
    }

    async fn get_by_task_id(&self, task_id: i64) -> Result<Inspection, RepositoryError> {
        self.inner.get_by_task_id(task_id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Inspection, RepositoryError> {
        self.inner.get_by_id(id).await
    }

    async fn add_attachment(
        &self,
        inspection_id: i64,
        file_id: i64,
        kind: AttachmentType,
    ) -> Result<Attachment, RepositoryError> {
        self.inner.add_attachment(inspection_id, file_id, kind).await
    }

    async fn add_inspected_devices(
        &self,
        inspection_id: i64,
        devices: &[InspectedDeviceRequest],
    ) -> Result<(), RepositoryError> {
        self.inner.add_inspected_devices(inspection_id, devices).await
    }

    async fn get_previous_device_readings(
        &self,
        inspection_id: i64,
        device_id: i64,
    ) -> Result<Vec<InspectedDevice>, RepositoryError> {
        self.inner
            .get_previous_device_readings(inspection_id, device_id)
            .await
    }

    async fn start_inspection(&self, task_id: i64) -> Result<Inspection, RepositoryError> {
        self.starts
            .lock()
            .expect("starts mutex poisoned")
            .push(task_id);
        self.inner.start_inspection(task_id).await
    }

    async fn finish_inspection(
        &self,
        request: &FinishInspectionRequest,
    ) -> Result<Inspection, RepositoryError> {
        self.inner.finish_inspection(request).await
    }
}
