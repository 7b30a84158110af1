use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::codes::{AttachmentType, InspectionStatus};
use super::domain::{
    Attachment, FinishInspectionRequest, InspectedDevice, InspectedDeviceRequest, InspectedSeal,
    Inspection,
};

/// Storage contract for inspections and their child rows.
#[async_trait]
pub trait InspectionRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Inspection>, RepositoryError>;

    async fn get_by_task_id(&self, task_id: i64) -> Result<Inspection, RepositoryError>;

    async fn get_by_id(&self, id: i64) -> Result<Inspection, RepositoryError>;

    async fn add_attachment(
        &self,
        inspection_id: i64,
        file_id: i64,
        kind: AttachmentType,
    ) -> Result<Attachment, RepositoryError>;

    /// Persist readings and the seals examined on each device.
    async fn add_inspected_devices(
        &self,
        inspection_id: i64,
        devices: &[InspectedDeviceRequest],
    ) -> Result<(), RepositoryError>;

    /// Readings of `device_id` recorded by other inspections, newest first.
    async fn get_previous_device_readings(
        &self,
        inspection_id: i64,
        device_id: i64,
    ) -> Result<Vec<InspectedDevice>, RepositoryError>;

    /// Create or update the row keyed by `task_id`, leaving it InWork.
    async fn start_inspection(&self, task_id: i64) -> Result<Inspection, RepositoryError>;

    async fn finish_inspection(
        &self,
        request: &FinishInspectionRequest,
    ) -> Result<Inspection, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("inspection not found")]
    NotFound,
    #[error("conflicting inspection state: {0}")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default)]
struct Store {
    next_id: i64,
    inspections: HashMap<i64, Inspection>,
    attachments: Vec<Attachment>,
    devices: Vec<InspectedDevice>,
    seals: Vec<InspectedSeal>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store used by the api binary and tests.
#[derive(Default)]
pub struct InMemoryInspectionRepository {
    store: Mutex<Store>,
}

impl InMemoryInspectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed row, replacing any row with the same id.
    pub fn seed(&self, inspection: Inspection) {
        let mut store = self.store.lock().expect("inspection store mutex poisoned");
        store.next_id = store.next_id.max(inspection.id);
        store.inspections.insert(inspection.id, inspection);
    }

    /// Record a historical reading; used to prime control acts.
    pub fn seed_reading(&self, reading: InspectedDevice) {
        let mut store = self.store.lock().expect("inspection store mutex poisoned");
        store.next_id = store.next_id.max(reading.id);
        store.devices.push(reading);
    }

    pub fn attachments(&self, inspection_id: i64) -> Vec<Attachment> {
        let store = self.store.lock().expect("inspection store mutex poisoned");
        store
            .attachments
            .iter()
            .filter(|attachment| attachment.inspection_id == inspection_id)
            .cloned()
            .collect()
    }

    pub fn inspected_devices(&self, inspection_id: i64) -> Vec<InspectedDevice> {
        let store = self.store.lock().expect("inspection store mutex poisoned");
        store
            .devices
            .iter()
            .filter(|device| device.inspection_id == inspection_id)
            .cloned()
            .collect()
    }

    pub fn inspected_seals(&self, inspection_id: i64) -> Vec<InspectedSeal> {
        let store = self.store.lock().expect("inspection store mutex poisoned");
        store
            .seals
            .iter()
            .filter(|seal| seal.inspection_id == inspection_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl InspectionRepository for InMemoryInspectionRepository {
    async fn get_all(&self) -> Result<Vec<Inspection>, RepositoryError> {
        let store = self.store.lock().expect("inspection store mutex poisoned");
        let mut inspections: Vec<Inspection> = store.inspections.values().cloned().collect();
        inspections.sort_by_key(|inspection| inspection.id);
        Ok(inspections)
    }

    async fn get_by_task_id(&self, task_id: i64) -> Result<Inspection, RepositoryError> {
        let store = self.store.lock().expect("inspection store mutex poisoned");
        store
            .inspections
            .values()
            .find(|inspection| inspection.task_id == task_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_id(&self, id: i64) -> Result<Inspection, RepositoryError> {
        let store = self.store.lock().expect("inspection store mutex poisoned");
        store
            .inspections
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn add_attachment(
        &self,
        inspection_id: i64,
        file_id: i64,
        kind: AttachmentType,
    ) -> Result<Attachment, RepositoryError> {
        let mut store = self.store.lock().expect("inspection store mutex poisoned");
        if !store.inspections.contains_key(&inspection_id) {
            return Err(RepositoryError::NotFound);
        }

        let attachment = Attachment {
            id: store.next_id(),
            inspection_id,
            r#type: kind,
            file_id,
            created_at: Utc::now(),
        };
        store.attachments.push(attachment.clone());
        Ok(attachment)
    }

    async fn add_inspected_devices(
        &self,
        inspection_id: i64,
        devices: &[InspectedDeviceRequest],
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().expect("inspection store mutex poisoned");
        if !store.inspections.contains_key(&inspection_id) {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        for device in devices {
            let row = InspectedDevice {
                id: store.next_id(),
                device_id: device.device_id,
                inspection_id,
                value: device.value,
                consumption: device.consumption,
                created_at: now,
            };
            store.devices.push(row);

            for seal in device.seals() {
                let row = InspectedSeal {
                    id: store.next_id(),
                    seal_id: seal.seal_id,
                    inspection_id,
                    is_broken: seal.is_broken,
                    created_at: now,
                };
                store.seals.push(row);
            }
        }

        Ok(())
    }

    async fn get_previous_device_readings(
        &self,
        inspection_id: i64,
        device_id: i64,
    ) -> Result<Vec<InspectedDevice>, RepositoryError> {
        let store = self.store.lock().expect("inspection store mutex poisoned");
        let mut readings: Vec<InspectedDevice> = store
            .devices
            .iter()
            .filter(|reading| reading.device_id == device_id)
            .filter(|reading| reading.inspection_id != inspection_id)
            .cloned()
            .collect();
        readings.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(readings)
    }

    async fn start_inspection(&self, task_id: i64) -> Result<Inspection, RepositoryError> {
        let mut store = self.store.lock().expect("inspection store mutex poisoned");
        let now = Utc::now();

        let existing = store
            .inspections
            .values_mut()
            .find(|inspection| inspection.task_id == task_id);

        if let Some(inspection) = existing {
            if inspection.status == InspectionStatus::Done {
                return Err(RepositoryError::Conflict(format!(
                    "inspection for task {task_id} is already done"
                )));
            }
            inspection.status = InspectionStatus::InWork;
            inspection.updated_at = now;
            return Ok(inspection.clone());
        }

        let id = store.next_id();
        let inspection = Inspection::started(id, task_id, now);
        store.inspections.insert(id, inspection.clone());
        Ok(inspection)
    }

    async fn finish_inspection(
        &self,
        request: &FinishInspectionRequest,
    ) -> Result<Inspection, RepositoryError> {
        let mut store = self.store.lock().expect("inspection store mutex poisoned");
        let inspection = store
            .inspections
            .get_mut(&request.id)
            .ok_or(RepositoryError::NotFound)?;

        if inspection.status == InspectionStatus::Done {
            return Err(RepositoryError::Conflict(format!(
                "inspection {} is already done",
                request.id
            )));
        }

        inspection.apply_finish(request, Utc::now());
        Ok(inspection.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use rust_decimal::Decimal;

    fn day(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 8, 0, 0).unwrap()
    }

    fn reading(
        id: i64,
        inspection_id: i64,
        device_id: i64,
        value: i64,
        at: DateTime<Utc>,
    ) -> InspectedDevice {
        InspectedDevice {
            id,
            device_id,
            inspection_id,
            value: Decimal::from(value),
            consumption: Decimal::ZERO,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn previous_readings_are_newest_first_and_skip_current_inspection() {
        let repository = InMemoryInspectionRepository::new();
        repository.seed_reading(reading(1, 10, 11, 100, day(10, 1)));
        repository.seed_reading(reading(2, 20, 11, 300, day(12, 1)));
        repository.seed_reading(reading(3, 30, 11, 250, day(11, 1)));
        repository.seed_reading(reading(4, 20, 12, 999, day(12, 2)));

        let readings = repository
            .get_previous_device_readings(20, 11)
            .await
            .expect("readings");
        let ids: Vec<i64> = readings.iter().map(|reading| reading.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn start_is_refused_once_done() {
        let repository = InMemoryInspectionRepository::new();
        let mut done = Inspection::started(1, 7, day(1, 1));
        done.status = InspectionStatus::Done;
        repository.seed(done);

        let err = repository.start_inspection(7).await.expect_err("done");
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
