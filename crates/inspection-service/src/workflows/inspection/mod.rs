//! Field inspections of metering devices.
//!
//! Task events move an inspection into work, photos are verified before they are attached,
//! and finishing an inspection produces the signed act the field team leaves on site.

pub mod acts;
pub mod codes;
mod consumer;
pub mod domain;
pub mod event_system;
pub mod events;
pub mod peers;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use acts::{
    compose, ActError, ActFields, ActInput, ActRenderer, ActTemplate, ActValue, ComposedAct,
    DocxTemplateRenderer, RenderError,
};
pub use codes::{
    AttachmentType, DevicePlaceType, InspectionEventType, InspectionStatus, InspectionType,
    MethodBy, ReasonType, Resolution, TaskEventType, TaskStatus,
};
pub use domain::{
    AttachPhotoRequest, Attachment, FinishInspectionRequest, InspectedDevice,
    InspectedDeviceRequest, InspectedSeal, InspectedSealRequest, Inspection,
};
pub use event_system::{
    EventSystemConfig, EventSystemStats, InspectionEventHandle, InspectionEventSystem,
    ShutdownReport,
};
pub use events::{EventPublisher, InspectionEvent, LogEventPublisher, PublishError, TaskEvent};
pub use peers::{InspectionPeers, PeerError};
pub use repository::{InMemoryInspectionRepository, InspectionRepository, RepositoryError};
pub use router::inspection_router;
pub use service::{InspectionService, InspectionServiceError};
