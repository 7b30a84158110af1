//! Read models returned by peer services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::inspection::codes::{DevicePlaceType, TaskStatus};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageAnalysis {
    pub is_blurred: bool,
    pub has_error: bool,
    pub blur_score: String,
    pub quality_score: String,
    pub filename: String,
    pub dimensions: String,
    pub channels: i32,
}

impl ImageAnalysis {
    pub fn is_rejected(&self) -> bool {
        self.is_blurred || self.has_error
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UploadedFile {
    #[serde(rename = "ID")]
    pub id: i64,
    pub file_name: String,
    pub file_size: i64,
    pub bucket: String,
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Inspector {
    #[serde(rename = "ID")]
    pub id: i64,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub phone_number: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Brigade {
    #[serde(rename = "ID")]
    pub id: i64,
    pub inspectors: Vec<Inspector>,
}

/// Upstream work order as served by the task service and carried in task events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Task {
    #[serde(rename = "ID")]
    pub id: i64,
    pub status: TaskStatus,
    #[serde(rename = "BrigadeID")]
    pub brigade_id: Option<i64>,
    #[serde(rename = "ObjectID")]
    pub object_id: i64,
    pub plan_visit_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Subscriber {
    #[serde(rename = "ID")]
    pub id: i64,
    pub account_number: String,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub phone_number: String,
    pub email: String,
    #[serde(rename = "INN")]
    pub inn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Seal {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "DeviceID")]
    pub device_id: i64,
    pub number: String,
    pub place: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Device {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "ObjectID")]
    pub object_id: i64,
    pub r#type: String,
    pub number: String,
    pub place_type: DevicePlaceType,
    pub place_description: String,
    pub seals: Vec<Seal>,
}

/// Site with its subscriber and metering devices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SiteObject {
    #[serde(rename = "ID")]
    pub id: i64,
    pub address: String,
    pub have_automaton: bool,
    pub subscriber: Subscriber,
    pub devices: Vec<Device>,
}

impl SiteObject {
    /// First device listed for the site; acts describe this one.
    pub fn primary_device(&self) -> Option<&Device> {
        self.devices.first()
    }

    pub fn device_number(&self, device_id: i64) -> Option<&str> {
        self.devices
            .iter()
            .find(|device| device.id == device_id)
            .map(|device| device.number.as_str())
    }

    pub fn seal_number(&self, seal_id: i64) -> Option<&str> {
        self.devices
            .iter()
            .flat_map(|device| device.seals.iter())
            .find(|seal| seal.id == seal_id)
            .map(|seal| seal.number.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Contract {
    #[serde(rename = "ID")]
    pub id: i64,
    pub number: String,
    pub subscriber: Subscriber,
    pub object: SiteObject,
}
