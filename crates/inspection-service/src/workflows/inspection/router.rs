use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;

use super::codes::AttachmentType;
use super::domain::{AttachPhotoRequest, FinishInspectionRequest};
use super::repository::{InspectionRepository, RepositoryError};
use super::service::{InspectionService, InspectionServiceError};

/// Photos arrive straight from phone cameras.
const UPLOAD_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// HTTP endpoints for querying, photo evidence and finishing inspections.
pub fn inspection_router<R>(service: Arc<InspectionService<R>>) -> Router
where
    R: InspectionRepository + 'static,
{
    Router::new()
        .route("/inspections", get(list_handler::<R>))
        .route("/inspections/task/:task_id", get(by_task_handler::<R>))
        .route("/inspections/:id/photo", post(attach_photo_handler::<R>))
        .route("/inspections/:id/finish", patch(finish_handler::<R>))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(service)
}

pub(crate) async fn list_handler<R>(State(service): State<Arc<InspectionService<R>>>) -> Response
where
    R: InspectionRepository + 'static,
{
    match service.get_all().await {
        Ok(inspections) => (StatusCode::OK, Json(inspections)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn by_task_handler<R>(
    State(service): State<Arc<InspectionService<R>>>,
    Path(task_id): Path<i64>,
) -> Response
where
    R: InspectionRepository + 'static,
{
    match service.get_by_task_id(task_id).await {
        Ok(inspection) => (StatusCode::OK, Json(inspection)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn attach_photo_handler<R>(
    State(service): State<Arc<InspectionService<R>>>,
    Path(inspection_id): Path<i64>,
    multipart: Multipart,
) -> Response
where
    R: InspectionRepository + 'static,
{
    let request = match read_photo_form(inspection_id, multipart).await {
        Ok(request) => request,
        Err(message) => {
            let payload = json!({ "error": message });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    match service.attach_photo(request).await {
        Ok(attachment) => (StatusCode::CREATED, Json(attachment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn finish_handler<R>(
    State(service): State<Arc<InspectionService<R>>>,
    Path(inspection_id): Path<i64>,
    Json(mut request): Json<FinishInspectionRequest>,
) -> Response
where
    R: InspectionRepository + 'static,
{
    request.id = inspection_id;
    match service.finish_inspection(request).await {
        Ok(file) => (StatusCode::OK, Json(file)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn read_photo_form(
    inspection_id: i64,
    mut multipart: Multipart,
) -> Result<AttachPhotoRequest, String> {
    let mut photo: Option<(String, Vec<u8>)> = None;
    let mut kind = None;
    let mut device_id = None;
    let mut seal_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| format!("invalid multipart body: {err}"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "Photo" => {
                if photo.is_some() {
                    return Err("exactly one Photo file is expected".to_string());
                }
                let file_name = field.file_name().unwrap_or("photo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| format!("failed to read Photo: {err}"))?;
                photo = Some((file_name, bytes.to_vec()));
            }
            "AttachmentType" => kind = Some(read_number(&name, field.text().await)?),
            "DeviceID" => device_id = Some(read_number(&name, field.text().await)?),
            "SealID" => seal_id = Some(read_number(&name, field.text().await)?),
            _ => {}
        }
    }

    let (file_name, image) = photo.ok_or_else(|| "Photo file is required".to_string())?;
    let kind = kind
        .map(|code| AttachmentType::from(i32::try_from(code).unwrap_or_default()))
        .ok_or_else(|| "AttachmentType is required".to_string())?;

    let target_id = match kind {
        AttachmentType::DevicePhoto => {
            device_id.ok_or_else(|| "DeviceID is required for device photos".to_string())?
        }
        AttachmentType::SealPhoto => {
            seal_id.ok_or_else(|| "SealID is required for seal photos".to_string())?
        }
        _ => device_id.or(seal_id).unwrap_or_default(),
    };

    Ok(AttachPhotoRequest {
        inspection_id,
        r#type: kind,
        target_id,
        file_name,
        image,
    })
}

fn read_number(
    name: &str,
    text: Result<String, axum::extract::multipart::MultipartError>,
) -> Result<i64, String> {
    let text = text.map_err(|err| format!("failed to read {name}: {err}"))?;
    text.trim()
        .parse::<i64>()
        .map_err(|_| format!("{name} must be an integer, got '{text}'"))
}

pub(crate) fn error_response(err: InspectionServiceError) -> Response {
    let status = match &err {
        InspectionServiceError::RejectedPhoto => {
            let payload = json!({ "error": err.to_string(), "code": "rejected_photo" });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
        InspectionServiceError::Repository { source, .. } => match source {
            RepositoryError::NotFound => StatusCode::NOT_FOUND,
            RepositoryError::Conflict(_) => StatusCode::CONFLICT,
            RepositoryError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        InspectionServiceError::AlreadyFinished(_) => StatusCode::CONFLICT,
        InspectionServiceError::Peer { .. } => StatusCode::BAD_GATEWAY,
        InspectionServiceError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        other if other.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
