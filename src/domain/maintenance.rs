use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceStatus {
    #[serde(rename = "Programado")]
    Scheduled,
    #[serde(rename = "Completado")]
    Completed,
    #[serde(rename = "Cancelado")]
    Cancelled,
}

impl MaintenanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MaintenanceStatus::Scheduled => "Programado",
            MaintenanceStatus::Completed => "Completado",
            MaintenanceStatus::Cancelled => "Cancelado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Programado" => Some(MaintenanceStatus::Scheduled),
            "Completado" => Some(MaintenanceStatus::Completed),
            "Cancelado" => Some(MaintenanceStatus::Cancelled),
            _ => None,
        }
    }
}

/// One-off maintenance event explicitly planned with a target date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMaintenance {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub equipment_display_name: String,
    pub status: MaintenanceStatus,
    pub scheduled_for: Date,
    pub created_by: Uuid,
}
