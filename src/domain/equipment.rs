use serde::{Deserialize, Serialize};
use time::{Date, Duration};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipmentStatus {
    #[serde(rename = "activo")]
    Active,
    #[serde(rename = "fuera_de_servicio")]
    OutOfService,
}

impl EquipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EquipmentStatus::Active => "activo",
            EquipmentStatus::OutOfService => "fuera_de_servicio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "activo" => Some(EquipmentStatus::Active),
            "fuera_de_servicio" => Some(EquipmentStatus::OutOfService),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub display_name: String,
    pub status: EquipmentStatus,
    pub last_maintenance: Option<Date>,
    pub maintenance_interval_days: i64,
}

impl Equipment {
    /// Next cyclic due date, absent when no maintenance was ever recorded.
    pub fn next_due(&self) -> Option<Date> {
        self.last_maintenance
            .map(|last| last + Duration::days(self.maintenance_interval_days))
    }
}
