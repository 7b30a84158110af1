use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::inspection::InspectionServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Workflow(InspectionServiceError),
    #[cfg(feature = "kafka")]
    Broker(rdkafka::error::KafkaError),
    #[cfg(feature = "postgres")]
    Database(sqlx::Error),
    #[cfg(feature = "postgres")]
    Migration(sqlx::migrate::MigrateError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Workflow(err) => write!(f, "workflow error: {}", err),
            #[cfg(feature = "kafka")]
            AppError::Broker(err) => write!(f, "broker error: {}", err),
            #[cfg(feature = "postgres")]
            AppError::Database(err) => write!(f, "database error: {}", err),
            #[cfg(feature = "postgres")]
            AppError::Migration(err) => write!(f, "migration error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Workflow(err) => Some(err),
            #[cfg(feature = "kafka")]
            AppError::Broker(err) => Some(err),
            #[cfg(feature = "postgres")]
            AppError::Database(err) => Some(err),
            #[cfg(feature = "postgres")]
            AppError::Migration(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Workflow(err) if err.is_validation() => StatusCode::BAD_REQUEST,
            AppError::Workflow(InspectionServiceError::Peer { .. }) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<InspectionServiceError> for AppError {
    fn from(value: InspectionServiceError) -> Self {
        Self::Workflow(value)
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for AppError {
    fn from(value: rdkafka::error::KafkaError) -> Self {
        Self::Broker(value)
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        Self::Database(value)
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::inspection::{ActError, PeerError};

    #[test]
    fn validation_failures_map_to_bad_request() {
        let error = AppError::from(InspectionServiceError::Act(ActError::InspectorCount(3)));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn peer_failures_map_to_bad_gateway() {
        let error = AppError::from(InspectionServiceError::Peer {
            context: "get task by id",
            source: PeerError::Status {
                service: "task",
                status: 503,
            },
        });
        assert_eq!(error.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn config_failures_are_internal() {
        let error = AppError::from(ConfigError::InvalidPort);
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
