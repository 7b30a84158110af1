use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::codes::{
    AttachmentType, InspectionStatus, InspectionType, MethodBy, ReasonType, Resolution,
};

/// Inspection row owned by this service; one per upstream task.
///
/// Type, resolution and the reason fields stay empty until the inspection is finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Inspection {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "TaskID")]
    pub task_id: i64,
    pub status: InspectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<InspectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_by: Option<MethodBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_type: Option<ReasonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_restriction_checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_violation_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expense_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_unauthorized_consumers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unauthorized_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unauthorized_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspect_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_action_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inspection {
    /// Fresh row for a task that has just been taken into work.
    pub fn started(id: i64, task_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            task_id,
            status: InspectionStatus::InWork,
            r#type: None,
            resolution: None,
            limit_reason: None,
            method: None,
            method_by: None,
            reason_type: None,
            reason_description: None,
            is_restriction_checked: None,
            is_violation_detected: None,
            is_expense_available: None,
            violation_description: None,
            is_unauthorized_consumers: None,
            unauthorized_description: None,
            unauthorized_explanation: None,
            inspect_at: None,
            energy_action_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy the finish fields of a request onto the row and mark it done.
    pub fn apply_finish(&mut self, request: &FinishInspectionRequest, now: DateTime<Utc>) {
        self.status = InspectionStatus::Done;
        self.r#type = Some(request.r#type);
        self.resolution = Some(request.resolution);
        self.limit_reason = request.limit_reason.clone();
        self.method = Some(request.method.clone());
        self.method_by = Some(request.method_by);
        self.reason_type = Some(request.reason_type);
        self.reason_description = request.reason_description.clone();
        self.is_restriction_checked = Some(request.is_restriction_checked);
        self.is_violation_detected = Some(request.is_violation_detected);
        self.is_expense_available = Some(request.is_expense_available);
        self.violation_description = request.violation_description.clone();
        self.is_unauthorized_consumers = Some(request.is_unauthorized_consumers);
        self.unauthorized_description = request.unauthorized_description.clone();
        self.unauthorized_explanation = request.unauthorized_explanation.clone();
        self.energy_action_at = Some(request.energy_action_at);
        self.inspect_at.get_or_insert(now);
        self.updated_at = now;
    }
}

/// Meter reading captured while finishing an inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectedDevice {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "DeviceID")]
    pub device_id: i64,
    #[serde(rename = "InspectionID")]
    pub inspection_id: i64,
    pub value: Decimal,
    pub consumption: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectedSeal {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "SealID")]
    pub seal_id: i64,
    #[serde(rename = "InspectionID")]
    pub inspection_id: i64,
    pub is_broken: bool,
    pub created_at: DateTime<Utc>,
}

/// File associated with an inspection: a verified photo or the generated act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attachment {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "InspectionID")]
    pub inspection_id: i64,
    pub r#type: AttachmentType,
    #[serde(rename = "FileID")]
    pub file_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Photo upload targeted at one device or one seal of the inspected object.
#[derive(Debug, Clone)]
pub struct AttachPhotoRequest {
    pub inspection_id: i64,
    pub r#type: AttachmentType,
    /// Device id for device photos, seal id for seal photos.
    pub target_id: i64,
    pub file_name: String,
    pub image: Vec<u8>,
}

/// Body of the finish call as submitted by the field application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FinishInspectionRequest {
    #[serde(rename = "ID", default)]
    pub id: i64,
    pub r#type: InspectionType,
    pub resolution: Resolution,
    #[serde(default)]
    pub limit_reason: Option<String>,
    #[serde(default)]
    pub method: String,
    pub method_by: MethodBy,
    pub reason_type: ReasonType,
    #[serde(default)]
    pub reason_description: Option<String>,
    #[serde(default)]
    pub is_restriction_checked: bool,
    #[serde(default)]
    pub is_violation_detected: bool,
    #[serde(default)]
    pub is_expense_available: bool,
    #[serde(default)]
    pub violation_description: Option<String>,
    #[serde(default)]
    pub is_unauthorized_consumers: bool,
    #[serde(default)]
    pub unauthorized_description: Option<String>,
    #[serde(default)]
    pub unauthorized_explanation: Option<String>,
    pub energy_action_at: DateTime<Utc>,
    #[serde(default)]
    pub inspected_devices: Vec<InspectedDeviceRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectedDeviceRequest {
    #[serde(rename = "DeviceID")]
    pub device_id: i64,
    pub value: Decimal,
    pub consumption: Decimal,
    /// `None` when the client omitted the array altogether.
    #[serde(default)]
    pub inspected_seals: Option<Vec<InspectedSealRequest>>,
}

impl InspectedDeviceRequest {
    pub fn seals(&self) -> &[InspectedSealRequest] {
        self.inspected_seals.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InspectedSealRequest {
    #[serde(rename = "SealID")]
    pub seal_id: i64,
    pub is_broken: bool,
}
