//! Postgres storage for inspections and their child rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::workflows::inspection::{
    AttachmentType, Attachment, FinishInspectionRequest, InspectedDevice, InspectedDeviceRequest,
    Inspection, InspectionRepository, InspectionStatus, InspectionType, MethodBy, ReasonType,
    RepositoryError, Resolution,
};

#[derive(Debug, FromRow)]
struct InspectionRow {
    id: i64,
    task_id: i64,
    status: i32,
    inspection_type: Option<i32>,
    resolution: Option<i32>,
    limit_reason: Option<String>,
    method: Option<String>,
    method_by: Option<i32>,
    reason_type: Option<i32>,
    reason_description: Option<String>,
    is_restriction_checked: Option<bool>,
    is_violation_detected: Option<bool>,
    is_expense_available: Option<bool>,
    violation_description: Option<String>,
    is_unauthorized_consumers: Option<bool>,
    unauthorized_description: Option<String>,
    unauthorized_explanation: Option<String>,
    inspect_at: Option<DateTime<Utc>>,
    energy_action_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InspectionRow> for Inspection {
    fn from(row: InspectionRow) -> Self {
        Self {
            id: row.id,
            task_id: row.task_id,
            status: InspectionStatus::from(row.status),
            r#type: row.inspection_type.map(InspectionType::from),
            resolution: row.resolution.map(Resolution::from),
            limit_reason: row.limit_reason,
            method: row.method,
            method_by: row.method_by.map(MethodBy::from),
            reason_type: row.reason_type.map(ReasonType::from),
            reason_description: row.reason_description,
            is_restriction_checked: row.is_restriction_checked,
            is_violation_detected: row.is_violation_detected,
            is_expense_available: row.is_expense_available,
            violation_description: row.violation_description,
            is_unauthorized_consumers: row.is_unauthorized_consumers,
            unauthorized_description: row.unauthorized_description,
            unauthorized_explanation: row.unauthorized_explanation,
            inspect_at: row.inspect_at,
            energy_action_at: row.energy_action_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AttachmentRow {
    id: i64,
    inspection_id: i64,
    attachment_type: i32,
    file_id: i64,
    created_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Self {
            id: row.id,
            inspection_id: row.inspection_id,
            r#type: AttachmentType::from(row.attachment_type),
            file_id: row.file_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct InspectedDeviceRow {
    id: i64,
    device_id: i64,
    inspection_id: i64,
    value: Decimal,
    consumption: Decimal,
    created_at: DateTime<Utc>,
}

impl From<InspectedDeviceRow> for InspectedDevice {
    fn from(row: InspectedDeviceRow) -> Self {
        Self {
            id: row.id,
            device_id: row.device_id,
            inspection_id: row.inspection_id,
            value: row.value,
            consumption: row.consumption,
            created_at: row.created_at,
        }
    }
}

/// [`InspectionRepository`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgInspectionRepository {
    pool: PgPool,
}

impl PgInspectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn storage_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        _ => RepositoryError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl InspectionRepository for PgInspectionRepository {
    async fn get_all(&self) -> Result<Vec<Inspection>, RepositoryError> {
        let rows = sqlx::query_as::<_, InspectionRow>("SELECT * FROM inspections ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(Inspection::from).collect())
    }

    async fn get_by_task_id(&self, task_id: i64) -> Result<Inspection, RepositoryError> {
        sqlx::query_as::<_, InspectionRow>("SELECT * FROM inspections WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Inspection::from)
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_id(&self, id: i64) -> Result<Inspection, RepositoryError> {
        sqlx::query_as::<_, InspectionRow>("SELECT * FROM inspections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Inspection::from)
            .ok_or(RepositoryError::NotFound)
    }

    async fn add_attachment(
        &self,
        inspection_id: i64,
        file_id: i64,
        kind: AttachmentType,
    ) -> Result<Attachment, RepositoryError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            INSERT INTO inspection_attachments (inspection_id, attachment_type, file_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(inspection_id)
        .bind(kind.code())
        .bind(file_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.into())
    }

    async fn add_inspected_devices(
        &self,
        inspection_id: i64,
        devices: &[InspectedDeviceRequest],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        for device in devices {
            sqlx::query(
                r#"
                INSERT INTO inspected_devices (device_id, inspection_id, value, consumption)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(device.device_id)
            .bind(inspection_id)
            .bind(device.value)
            .bind(device.consumption)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

            for seal in device.seals() {
                sqlx::query(
                    r#"
                    INSERT INTO inspected_seals (seal_id, inspection_id, is_broken)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(seal.seal_id)
                .bind(inspection_id)
                .bind(seal.is_broken)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
            }
        }

        tx.commit().await.map_err(storage_error)
    }

    async fn get_previous_device_readings(
        &self,
        inspection_id: i64,
        device_id: i64,
    ) -> Result<Vec<InspectedDevice>, RepositoryError> {
        let rows = sqlx::query_as::<_, InspectedDeviceRow>(
            r#"
            SELECT * FROM inspected_devices
            WHERE device_id = $1 AND inspection_id <> $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(device_id)
        .bind(inspection_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(InspectedDevice::from).collect())
    }

    async fn start_inspection(&self, task_id: i64) -> Result<Inspection, RepositoryError> {
        // The conditional upsert yields no row when the existing inspection is already done.
        let row = sqlx::query_as::<_, InspectionRow>(
            r#"
            INSERT INTO inspections (task_id, status)
            VALUES ($1, $2)
            ON CONFLICT (task_id) DO UPDATE
                SET status = EXCLUDED.status, updated_at = now()
                WHERE inspections.status <> $3
            RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(InspectionStatus::InWork.code())
        .bind(InspectionStatus::Done.code())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Inspection::from).ok_or_else(|| {
            RepositoryError::Conflict(format!("inspection for task {task_id} is already done"))
        })
    }

    async fn finish_inspection(
        &self,
        request: &FinishInspectionRequest,
    ) -> Result<Inspection, RepositoryError> {
        let row = sqlx::query_as::<_, InspectionRow>(
            r#"
            UPDATE inspections SET
                status = $2,
                inspection_type = $3,
                resolution = $4,
                limit_reason = $5,
                method = $6,
                method_by = $7,
                reason_type = $8,
                reason_description = $9,
                is_restriction_checked = $10,
                is_violation_detected = $11,
                is_expense_available = $12,
                violation_description = $13,
                is_unauthorized_consumers = $14,
                unauthorized_description = $15,
                unauthorized_explanation = $16,
                energy_action_at = $17,
                inspect_at = COALESCE(inspect_at, now()),
                updated_at = now()
            WHERE id = $1 AND status <> $2
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(InspectionStatus::Done.code())
        .bind(request.r#type.code())
        .bind(request.resolution.code())
        .bind(request.limit_reason.as_deref())
        .bind(request.method.as_str())
        .bind(request.method_by.code())
        .bind(request.reason_type.code())
        .bind(request.reason_description.as_deref())
        .bind(request.is_restriction_checked)
        .bind(request.is_violation_detected)
        .bind(request.is_expense_available)
        .bind(request.violation_description.as_deref())
        .bind(request.is_unauthorized_consumers)
        .bind(request.unauthorized_description.as_deref())
        .bind(request.unauthorized_explanation.as_deref())
        .bind(request.energy_action_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                self.get_by_id(request.id).await?;
                Err(RepositoryError::Conflict(format!(
                    "inspection {} is already done",
                    request.id
                )))
            }
        }
    }
}
