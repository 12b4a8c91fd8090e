use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub equipment_id: Uuid,
    pub read: bool,
    pub event_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Notification {
    pub fn dedup_key(&self) -> String {
        dedup_key(self.equipment_id, self.event_date)
    }
}

/// Composite key guaranteeing at most one reminder per (equipment, day) pair.
pub fn dedup_key(equipment_id: Uuid, event_date: Date) -> String {
    format!("{}_{}", equipment_id, event_date)
}
