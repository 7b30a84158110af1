//! Capabilities this service consumes from peer services.
//!
//! Each peer is a trait so the workflows can be wired with either the reqwest adapters in
//! [`http`] or scripted doubles in tests.

pub mod http;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;

pub use models::{
    Brigade, Contract, Device, ImageAnalysis, Inspector, Seal, SiteObject, Subscriber, Task,
    UploadedFile,
};

#[async_trait]
pub trait AnalyzerService: Send + Sync {
    async fn process_image(
        &self,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<ImageAnalysis, PeerError>;
}

#[async_trait]
pub trait SubscriberService: Send + Sync {
    async fn get_object_by_device_id(&self, device_id: i64) -> Result<SiteObject, PeerError>;

    async fn get_object_by_seal_id(&self, seal_id: i64) -> Result<SiteObject, PeerError>;

    async fn get_last_contract_by_object_id(&self, object_id: i64)
        -> Result<Contract, PeerError>;
}

#[async_trait]
pub trait FileService: Send + Sync {
    async fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<UploadedFile, PeerError>;
}

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn get_task_by_id(&self, id: i64) -> Result<Task, PeerError>;
}

#[async_trait]
pub trait BrigadeService: Send + Sync {
    async fn get_brigade_by_id(&self, id: i64) -> Result<Brigade, PeerError>;
}

/// Failure talking to a peer. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },
    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} returned an undecodable body: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

/// The full set of peers a workflow talks to.
#[derive(Clone)]
pub struct InspectionPeers {
    pub analyzer: Arc<dyn AnalyzerService>,
    pub subscribers: Arc<dyn SubscriberService>,
    pub files: Arc<dyn FileService>,
    pub tasks: Arc<dyn TaskService>,
    pub brigades: Arc<dyn BrigadeService>,
}
