//! Vehicle pass records as the checkpoint sees them.
//!
//! These are owned by the application-management side; the checkpoint only
//! reads them through a `PassLookup`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "completed" => Ok(ApplicationStatus::Completed),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Vehicle details copied into scan logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub plate_number: String,
    pub vehicle_type: String,
    pub driver_name: Option<String>,
}

/// RFID assignment attached to an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidInfo {
    pub tag_id: String,
    pub is_active: bool,
    pub valid_until: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehiclePassRecord {
    pub id: Uuid,
    pub status: ApplicationStatus,
    pub vehicle: VehicleInfo,
    /// `None` when no tag was ever assigned.
    pub rfid: Option<RfidInfo>,
    pub linked_user_id: Option<Uuid>,
}
