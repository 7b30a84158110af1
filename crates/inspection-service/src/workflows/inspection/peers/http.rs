//! reqwest adapters for the peer services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    AnalyzerService, Brigade, BrigadeService, Contract, FileService, ImageAnalysis,
    InspectionPeers, PeerError, SiteObject, SubscriberService, Task, TaskService, UploadedFile,
};
use crate::config::PeersConfig;

#[derive(Debug, Clone)]
struct PeerClient {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl PeerClient {
    fn new(client: Client, base_url: &str, service: &'static str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PeerError> {
        let url = self.url(path);
        debug!(service = self.service, %url, "peer GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;

        self.decode(response).await
    }

    async fn post_file<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &'static str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<T, PeerError> {
        let url = self.url(path);
        debug!(service = self.service, %url, file_name, size = content.len(), "peer upload");

        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())
            .map_err(|err| self.request_error(err))?;
        let form = Form::new().part(field, part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;

        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, PeerError> {
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PeerError::Status {
                service: self.service,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|err| PeerError::Decode {
            service: self.service,
            message: err.to_string(),
        })
    }

    fn request_error(&self, err: reqwest::Error) -> PeerError {
        PeerError::Request {
            service: self.service,
            message: err.to_string(),
        }
    }
}

pub struct HttpAnalyzerService(PeerClient);

#[async_trait]
impl AnalyzerService for HttpAnalyzerService {
    async fn process_image(
        &self,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<ImageAnalysis, PeerError> {
        self.0
            .post_file("/process-image", "file", file_name, image)
            .await
    }
}

pub struct HttpSubscriberService(PeerClient);

#[async_trait]
impl SubscriberService for HttpSubscriberService {
    async fn get_object_by_device_id(&self, device_id: i64) -> Result<SiteObject, PeerError> {
        self.0
            .get_json(&format!("/objects/devices/{device_id}"))
            .await
    }

    async fn get_object_by_seal_id(&self, seal_id: i64) -> Result<SiteObject, PeerError> {
        self.0.get_json(&format!("/objects/seals/{seal_id}")).await
    }

    async fn get_last_contract_by_object_id(
        &self,
        object_id: i64,
    ) -> Result<Contract, PeerError> {
        self.0
            .get_json(&format!("/contracts/objects/{object_id}/last"))
            .await
    }
}

pub struct HttpFileService(PeerClient);

#[async_trait]
impl FileService for HttpFileService {
    async fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<UploadedFile, PeerError> {
        self.0.post_file("/files", "File", file_name, content).await
    }
}

pub struct HttpTaskService(PeerClient);

#[async_trait]
impl TaskService for HttpTaskService {
    async fn get_task_by_id(&self, id: i64) -> Result<Task, PeerError> {
        self.0.get_json(&format!("/tasks/{id}")).await
    }
}

pub struct HttpBrigadeService(PeerClient);

#[async_trait]
impl BrigadeService for HttpBrigadeService {
    async fn get_brigade_by_id(&self, id: i64) -> Result<Brigade, PeerError> {
        self.0.get_json(&format!("/brigades/{id}")).await
    }
}

/// Build every peer adapter over one shared connection pool.
pub fn http_peers(config: &PeersConfig) -> Result<InspectionPeers, PeerError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(format!("inspection-service/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| PeerError::Request {
            service: "http client",
            message: err.to_string(),
        })?;

    let peer = |base_url: &str, service: &'static str| {
        PeerClient::new(client.clone(), base_url, service)
    };

    Ok(InspectionPeers {
        analyzer: Arc::new(HttpAnalyzerService(peer(&config.analyzer_url, "analyzer"))),
        subscribers: Arc::new(HttpSubscriberService(peer(
            &config.subscriber_url,
            "subscriber",
        ))),
        files: Arc::new(HttpFileService(peer(&config.file_url, "file"))),
        tasks: Arc::new(HttpTaskService(peer(&config.task_url, "task"))),
        brigades: Arc::new(HttpBrigadeService(peer(&config.brigade_url, "brigade"))),
    })
}
