//! Act composition.
//!
//! [`compose`] derives the flat placeholder map for one finished inspection and picks the
//! template variant. It performs no I/O and takes the composition instant as input, so the
//! same inputs always produce the same map. Turning the map into document bytes is the job
//! of an [`ActRenderer`].

pub mod format;
pub mod render;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use self::format::{full_name, seal_phrase, short_name, SiteDate};
use super::codes::{DevicePlaceType, InspectionType, MethodBy, ReasonType, Resolution};
use super::domain::{FinishInspectionRequest, InspectedDevice};
use super::peers::{Brigade, Contract, Inspector};

pub use render::{ActRenderer, DocxTemplateRenderer, RenderError};

/// Document variant an act is rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActTemplate {
    /// Limitation and resumption of supply.
    Universal,
    /// Verification visits and unauthorized connection checks.
    Control,
}

impl ActTemplate {
    pub fn for_type(kind: InspectionType) -> Result<Self, ActError> {
        match kind {
            InspectionType::Limitation | InspectionType::Resumption => Ok(Self::Universal),
            InspectionType::Verification | InspectionType::UnauthorizedConnection => {
                Ok(Self::Control)
            }
            InspectionType::Unknown | InspectionType::Unrecognized(_) => {
                Err(ActError::InvalidType(kind.code()))
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Universal => "universal",
            Self::Control => "control",
        }
    }

    fn category(self) -> &'static str {
        match self {
            Self::Universal => "о введении ограничения и возобновления",
            Self::Control => "контроля",
        }
    }

    /// Name the uploaded act is stored under.
    pub fn file_name(self, inspection_id: i64, now: DateTime<Utc>, address: &str) -> String {
        format!(
            "Акт {} №{} от {} ({}).docx",
            self.category(),
            inspection_id,
            format::file_date(now),
            address
        )
    }
}

/// A single placeholder value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActValue {
    Text(String),
    Number(i64),
    /// Exact meter figures; rendered with their original scale.
    Decimal(Decimal),
    /// Checkbox, rendered as ☒ or ☐.
    Glyph(bool),
}

impl fmt::Display for ActValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActValue::Text(text) => f.write_str(text),
            ActValue::Number(number) => write!(f, "{number}"),
            ActValue::Decimal(value) => write!(f, "{value}"),
            ActValue::Glyph(true) => f.write_str("☒"),
            ActValue::Glyph(false) => f.write_str("☐"),
        }
    }
}

impl Serialize for ActValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActValue::Number(number) => serializer.serialize_i64(*number),
            other => serializer.collect_str(other),
        }
    }
}

impl From<&str> for ActValue {
    fn from(value: &str) -> Self {
        ActValue::Text(value.to_string())
    }
}

impl From<String> for ActValue {
    fn from(value: String) -> Self {
        ActValue::Text(value)
    }
}

impl From<i64> for ActValue {
    fn from(value: i64) -> Self {
        ActValue::Number(value)
    }
}

impl From<Decimal> for ActValue {
    fn from(value: Decimal) -> Self {
        ActValue::Decimal(value)
    }
}

impl From<bool> for ActValue {
    fn from(value: bool) -> Self {
        ActValue::Glyph(value)
    }
}

/// Placeholder token to display value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActFields(BTreeMap<&'static str, ActValue>);

impl ActFields {
    pub fn set(&mut self, token: &'static str, value: impl Into<ActValue>) {
        self.0.insert(token, value.into());
    }

    pub fn get(&self, token: &str) -> Option<&ActValue> {
        self.0.get(token)
    }

    /// Checkbox state of `token`, `None` when absent or not a checkbox.
    pub fn flag(&self, token: &str) -> Option<bool> {
        match self.0.get(token) {
            Some(ActValue::Glyph(checked)) => Some(*checked),
            _ => None,
        }
    }

    pub fn text(&self, token: &str) -> Option<String> {
        self.0.get(token).map(ToString::to_string)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ActValue)> {
        self.0.iter().map(|(token, value)| (*token, value))
    }
}

/// Everything a composition reads.
#[derive(Debug, Clone, Copy)]
pub struct ActInput<'a> {
    pub request: &'a FinishInspectionRequest,
    pub brigade: &'a Brigade,
    pub contract: &'a Contract,
    /// Earlier readings of the primary device, newest first. Only control acts use them.
    pub previous_readings: &'a [InspectedDevice],
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedAct {
    pub template: ActTemplate,
    pub fields: ActFields,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActError {
    #[error("invalid inspection type: {0}")]
    InvalidType(i32),
    #[error("brigade must have exactly two inspectors, got {0}")]
    InspectorCount(usize),
    #[error("no inspected devices in request")]
    NoInspectedDevices,
    #[error("inspected device {0} has no seals array")]
    MissingSeals(i64),
    #[error("contract object has no devices")]
    NoContractDevices,
    #[error("invalid device place: {0}")]
    InvalidPlaceType(i32),
    #[error("invalid method by: {0}")]
    InvalidMethodBy(i32),
    #[error("invalid resolution: {0}")]
    InvalidResolution(i32),
    #[error("invalid reason type: {0}")]
    InvalidReasonType(i32),
}

/// Derive the placeholder map for the template selected by the request's inspection type.
pub fn compose(input: ActInput<'_>) -> Result<ComposedAct, ActError> {
    let request = input.request;
    let template = ActTemplate::for_type(request.r#type)?;

    let [first, second] = input.brigade.inspectors.as_slice() else {
        return Err(ActError::InspectorCount(input.brigade.inspectors.len()));
    };

    let inspected = request
        .inspected_devices
        .first()
        .ok_or(ActError::NoInspectedDevices)?;
    let seals = inspected
        .inspected_seals
        .as_deref()
        .ok_or(ActError::MissingSeals(inspected.device_id))?;

    let object = &input.contract.object;
    let device = object.primary_device().ok_or(ActError::NoContractDevices)?;

    let (is_inside, is_outside) = match device.place_type {
        DevicePlaceType::Flat => (true, false),
        DevicePlaceType::StairLanding => (false, true),
        DevicePlaceType::Other => (false, false),
        DevicePlaceType::Unknown | DevicePlaceType::Unrecognized(_) => {
            return Err(ActError::InvalidPlaceType(device.place_type.code()))
        }
    };

    let by_consumer = match request.method_by {
        MethodBy::Consumer => true,
        MethodBy::Inspector => false,
        MethodBy::Unknown | MethodBy::Unrecognized(_) => {
            return Err(ActError::InvalidMethodBy(request.method_by.code()))
        }
    };

    let mut fields = ActFields::default();

    let act = SiteDate::of(input.now);
    fields.set("act_number", request.id);
    fields.set("act_day", act.day.clone());
    fields.set("act_month", act.month);
    fields.set("act_year", act.year);
    fields.set("act_hour", act.hour.clone());
    fields.set("act_minute", act.minute.clone());
    fields.set("act_place", object.address.as_str());
    fields.set("address", object.address.as_str());

    let subscriber = &input.contract.subscriber;
    fields.set(
        "consumer_fio",
        full_name(&subscriber.surname, &subscriber.name, &subscriber.patronymic),
    );
    fields.set("account_number", subscriber.account_number.as_str());
    fields.set("have_automaton", object.have_automaton);
    fields.set("no_automaton", !object.have_automaton);

    let other_reason = non_empty(&request.limit_reason);
    fields.set("is_incomplete_payment", other_reason.is_none());
    fields.set("is_other_reason", other_reason.is_some());
    fields.set("other_reason", other_reason.unwrap_or_default());

    let energy = SiteDate::of(request.energy_action_at);
    fields.set("energy_hour", energy.hour);
    fields.set("energy_minute", energy.minute);
    fields.set("energy_day", energy.day);
    fields.set("energy_month", energy.month);
    fields.set("energy_year", energy.year);

    fields.set("is_by_consumer", by_consumer);
    fields.set("is_by_inspector", !by_consumer);

    fields.set("is_inside", is_inside);
    fields.set("is_outside", is_outside);
    fields.set("other_place", device.place_description.as_str());
    fields.set("device_type", device.r#type.as_str());
    fields.set("device_number", device.number.as_str());
    fields.set("device_value", inspected.value);

    let seals = seals
        .iter()
        .map(|seal| seal_phrase(seal.seal_id, seal.is_broken))
        .collect::<Vec<_>>()
        .join(", ");
    fields.set("seals", seals);

    set_inspector(&mut fields, "inspector1_initials", "inspector1_fio", first);
    set_inspector(&mut fields, "inspector2_initials", "inspector2_fio", second);

    match template {
        ActTemplate::Universal => universal_fields(&mut fields, request)?,
        ActTemplate::Control => control_fields(&mut fields, &input, inspected.consumption, &act)?,
    }

    Ok(ComposedAct { template, fields })
}

fn universal_fields(
    fields: &mut ActFields,
    request: &FinishInspectionRequest,
) -> Result<(), ActError> {
    let (limited, stopped, resumed) = match request.resolution {
        Resolution::Limited => (true, false, false),
        Resolution::Stopped => (false, true, false),
        Resolution::Resumed => (false, false, true),
        Resolution::Unknown | Resolution::Unrecognized(_) => {
            return Err(ActError::InvalidResolution(request.resolution.code()))
        }
    };
    fields.set("is_limitation", !resumed);
    fields.set("is_resumption", resumed);
    fields.set("is_energy_limited", limited);
    fields.set("is_energy_stopped", stopped);
    fields.set("is_energy_resumed", resumed);

    fields.set("method", request.method.as_str());

    let (not_introduced, consumer_limited, inspector_limited) = match request.reason_type {
        ReasonType::NotIntroduced => (true, false, false),
        ReasonType::ConsumerLimited => (false, true, false),
        ReasonType::InspectorLimited => (false, false, true),
        ReasonType::Resumed | ReasonType::Unknown | ReasonType::Unrecognized(_) => {
            return Err(ActError::InvalidReasonType(request.reason_type.code()))
        }
    };
    fields.set("is_not_introduced", not_introduced);
    fields.set("is_consumer_limited", consumer_limited);
    fields.set("is_inspector_limited", inspector_limited);
    fields.set(
        "is_not_introduced_reason",
        non_empty(&request.reason_description).unwrap_or_default(),
    );

    Ok(())
}

fn control_fields(
    fields: &mut ActFields,
    input: &ActInput<'_>,
    consumption: Decimal,
    check: &SiteDate,
) -> Result<(), ActError> {
    let request = input.request;

    let unauthorized = request.r#type == InspectionType::UnauthorizedConnection;
    fields.set("is_verification", !unauthorized);
    fields.set("is_unauthorized_connection", unauthorized);

    let (limited, stopped) = match request.resolution {
        Resolution::Limited => (true, false),
        Resolution::Stopped => (false, true),
        Resolution::Resumed | Resolution::Unknown | Resolution::Unrecognized(_) => {
            return Err(ActError::InvalidResolution(request.resolution.code()))
        }
    };
    fields.set("is_energy_limited", limited);
    fields.set("is_energy_stopped", stopped);

    fields.set("consumer_phone", input.contract.subscriber.phone_number.as_str());

    fields.set("is_checked", request.is_restriction_checked);
    fields.set("check_hour", check.hour.clone());
    fields.set("check_minute", check.minute.clone());
    fields.set("check_day", check.day.clone());
    fields.set("check_month", check.month);
    fields.set("check_year", check.year);

    fields.set("is_violation_detected", request.is_violation_detected);
    fields.set("is_violation_not_detected", !request.is_violation_detected);
    fields.set("is_expense_available", request.is_expense_available);

    let other_violation = non_empty(&request.violation_description);
    fields.set("is_other_violation", other_violation.is_some());
    fields.set("other_violation", other_violation.unwrap_or_default());

    fields.set("is_unauthorized_consumers", request.is_unauthorized_consumers);
    fields.set(
        "is_not_unauthorized_consumers",
        !request.is_unauthorized_consumers,
    );
    fields.set(
        "unauthorized_description",
        non_empty(&request.unauthorized_description).unwrap_or_default(),
    );
    fields.set(
        "unauthorized_explanation",
        non_empty(&request.unauthorized_explanation).unwrap_or_default(),
    );

    let (old_value, old_at) = match input.previous_readings.first() {
        Some(reading) => (reading.value, reading.created_at),
        None => (Decimal::ZERO, input.now),
    };
    let old = SiteDate::of(old_at);
    fields.set("old_value_day", old.day);
    fields.set("old_value_month", old.month_number);
    fields.set("old_value_year", old.year);
    fields.set("old_device_value", old_value);
    fields.set("device_consumption", consumption);

    Ok(())
}

fn set_inspector(
    fields: &mut ActFields,
    initials_token: &'static str,
    full_token: &'static str,
    inspector: &Inspector,
) {
    fields.set(
        initials_token,
        short_name(&inspector.surname, &inspector.name, &inspector.patronymic),
    );
    fields.set(
        full_token,
        full_name(&inspector.surname, &inspector.name, &inspector.patronymic),
    );
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}
