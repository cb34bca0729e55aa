use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pass::{RfidInfo, VehicleInfo, VehiclePassRecord};

/// Terminal result of evaluating one tag. Every other outcome field is a
/// function of the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanCategory {
    NoTagSupplied,
    NotFound,
    Inactive,
    NotCompleted,
    Expired,
    Granted,
}

impl ScanCategory {
    pub const ALL: [ScanCategory; 6] = [
        ScanCategory::NoTagSupplied,
        ScanCategory::NotFound,
        ScanCategory::Inactive,
        ScanCategory::NotCompleted,
        ScanCategory::Expired,
        ScanCategory::Granted,
    ];

    pub fn status_code(&self) -> u16 {
        match self {
            ScanCategory::NoTagSupplied => 400,
            ScanCategory::NotFound => 404,
            ScanCategory::Inactive => 423,
            ScanCategory::NotCompleted => 409,
            ScanCategory::Expired => 410,
            ScanCategory::Granted => 200,
        }
    }

    pub fn result(&self) -> ScanResult {
        match self {
            ScanCategory::Granted => ScanResult::Success,
            _ => ScanResult::Denied,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ScanCategory::NoTagSupplied => "Tag ID is required",
            ScanCategory::NotFound => "RFID tag not found",
            ScanCategory::Inactive => "RFID tag is not active",
            ScanCategory::NotCompleted => "Application not completed",
            ScanCategory::Expired => "RFID tag expired",
            ScanCategory::Granted => "Access granted",
        }
    }

    /// Machine-readable denial code; `None` when access is granted.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            ScanCategory::NoTagSupplied => Some("TAG_REQUIRED"),
            ScanCategory::NotFound => Some("TAG_NOT_FOUND"),
            ScanCategory::Inactive => Some("TAG_INACTIVE"),
            ScanCategory::NotCompleted => Some("APPLICATION_NOT_COMPLETED"),
            ScanCategory::Expired => Some("TAG_EXPIRED"),
            ScanCategory::Granted => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanResult {
    Success,
    Denied,
    Error,
}

impl ScanResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanResult::Success => "success",
            ScanResult::Denied => "denied",
            ScanResult::Error => "error",
        }
    }
}

/// Error code written for infrastructure faults.
pub const SYSTEM_ERROR_CODE: &str = "SYSTEM_ERROR";
const SYSTEM_ERROR_MESSAGE: &str = "System error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub plate_number: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub driver_name: Option<String>,
}

impl From<&VehicleInfo> for VehicleSnapshot {
    fn from(v: &VehicleInfo) -> Self {
        Self {
            plate_number: v.plate_number.clone(),
            vehicle_type: v.vehicle_type.clone(),
            driver_name: v.driver_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfidValidity {
    pub is_active: bool,
    #[serde(default, with = "iso_millis::option")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_millis::option")]
    pub assigned_at: Option<DateTime<Utc>>,
}

impl From<&RfidInfo> for RfidValidity {
    fn from(r: &RfidInfo) -> Self {
        Self {
            is_active: r.is_active,
            valid_until: r.valid_until,
            assigned_at: r.assigned_at,
        }
    }
}

/// The fully-determined result of one validation.
///
/// Snapshots are present exactly when a record matched the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub category: ScanCategory,
    pub application_id: Option<Uuid>,
    pub linked_user_id: Option<Uuid>,
    pub vehicle: Option<VehicleSnapshot>,
    pub rfid_validity: Option<RfidValidity>,
}

impl ValidationOutcome {
    /// Outcome for a category reached before any record was found.
    pub fn without_record(category: ScanCategory) -> Self {
        Self {
            category,
            application_id: None,
            linked_user_id: None,
            vehicle: None,
            rfid_validity: None,
        }
    }

    pub fn with_record(category: ScanCategory, record: &VehiclePassRecord) -> Self {
        Self {
            category,
            application_id: Some(record.id),
            linked_user_id: record.linked_user_id,
            vehicle: Some(VehicleSnapshot::from(&record.vehicle)),
            rfid_validity: record.rfid.as_ref().map(RfidValidity::from),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.category.status_code()
    }

    pub fn result(&self) -> ScanResult {
        self.category.result()
    }

    pub fn message(&self) -> &'static str {
        self.category.message()
    }

    pub fn error_code(&self) -> Option<&'static str> {
        self.category.error_code()
    }
}

/// Wall-clock bounds of one scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    pub started_at: DateTime<Utc>,
    pub responded_at: DateTime<Utc>,
}

impl ScanTiming {
    /// Elapsed milliseconds, clamped at zero if the clock stepped backwards.
    pub fn response_time_ms(&self) -> i64 {
        (self.responded_at - self.started_at).num_milliseconds().max(0)
    }
}

/// One append-only scan log document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanLogEntry {
    pub scan_id: String,
    pub tag_id: String,
    pub application_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub vehicle: Option<VehicleSnapshot>,
    pub rfid_validity: Option<RfidValidity>,
    pub scan_type: &'static str,
    pub direction: &'static str,
    pub scan_result: ScanResult,
    pub scan_message: String,
    pub status_code: u16,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub system_status: &'static str,
    pub response_time: i64,
    #[serde(with = "iso_millis")]
    pub scan_timestamp: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub logged_at: DateTime<Utc>,
}

impl ScanLogEntry {
    fn base(tag_id: &str, timing: &ScanTiming) -> Self {
        Self {
            scan_id: generate_scan_id(),
            tag_id: tag_id.to_string(),
            application_id: None,
            user_id: None,
            vehicle: None,
            rfid_validity: None,
            scan_type: "validation",
            direction: "both",
            scan_result: ScanResult::Error,
            scan_message: String::new(),
            status_code: 500,
            error_code: None,
            error_message: None,
            system_status: "online",
            response_time: timing.response_time_ms(),
            scan_timestamp: timing.started_at,
            logged_at: Utc::now(),
        }
    }

    pub fn from_outcome(outcome: &ValidationOutcome, tag_id: &str, timing: &ScanTiming) -> Self {
        Self {
            application_id: outcome.application_id,
            user_id: outcome.linked_user_id,
            vehicle: outcome.vehicle.clone(),
            rfid_validity: outcome.rfid_validity.clone(),
            scan_result: outcome.result(),
            scan_message: outcome.message().to_string(),
            status_code: outcome.status_code(),
            error_code: outcome.error_code().map(String::from),
            ..Self::base(tag_id, timing)
        }
    }

    /// Entry for a scan that failed with an infrastructure fault.
    pub fn from_fault(tag_id: &str, message: &str, timing: &ScanTiming) -> Self {
        Self {
            scan_result: ScanResult::Error,
            scan_message: SYSTEM_ERROR_MESSAGE.to_string(),
            status_code: 500,
            error_code: Some(SYSTEM_ERROR_CODE.to_string()),
            error_message: Some(message.to_string()),
            ..Self::base(tag_id, timing)
        }
    }

    /// Serialize to the sparse document handed to a sink.
    pub fn to_document(&self) -> serde_json::Value {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        crate::middleware::sparse::prune(value)
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// `scan_<unix-millis>_<9 base36 chars>`.
pub fn generate_scan_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("scan_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Canonical timestamp text: RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => super::serialize(ts, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<String> = Option::deserialize(d)?;
            raw.map(|r| {
                DateTime::parse_from_rfc3339(&r)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}
