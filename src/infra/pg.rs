use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::Date;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::equipment::{Equipment, EquipmentStatus};
use crate::domain::maintenance::{MaintenanceStatus, ScheduledMaintenance};
use crate::domain::notification::Notification;
use crate::domain::profile::{AccountStatus, Profile, Role};
use crate::infra::db::Db;
use crate::infra::store::{MaintenanceStore, NotificationBatch};

/// Postgres-backed document store. Snapshot subscriptions are in-process: a
/// committed batch re-queries the affected user's collection and pushes the
/// fresh list through a watch channel.
pub struct PgStore {
    db: Db,
    feeds: Mutex<HashMap<Uuid, watch::Sender<Vec<Notification>>>>,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            feeds: Mutex::new(HashMap::new()),
        }
    }

    async fn push_snapshot(&self, user_id: Uuid) -> Result<()> {
        if !self.feeds.lock().unwrap().contains_key(&user_id) {
            return Ok(());
        }
        let items = self.notifications_for(user_id).await?;
        if let Some(sender) = self.feeds.lock().unwrap().get(&user_id) {
            sender.send_replace(items);
        }
        Ok(())
    }
}

fn profile_from_row(row: &PgRow) -> Result<Profile> {
    let role: String = row.get("role");
    let status: String = row.get("status");
    Ok(Profile {
        uid: row.get("uid"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        role: Role::parse(&role).ok_or_else(|| anyhow!("unknown role: {}", role))?,
        status: AccountStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown account status: {}", status))?,
    })
}

fn equipment_from_row(row: &PgRow) -> Result<Equipment> {
    let status: String = row.get("status");
    Ok(Equipment {
        id: row.get("id"),
        display_name: row.get("display_name"),
        status: EquipmentStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown equipment status: {}", status))?,
        last_maintenance: row.get("last_maintenance"),
        maintenance_interval_days: row.get("maintenance_interval_days"),
    })
}

fn maintenance_from_row(row: &PgRow) -> Result<ScheduledMaintenance> {
    let status: String = row.get("status");
    Ok(ScheduledMaintenance {
        id: row.get("id"),
        equipment_id: row.get("equipment_id"),
        equipment_display_name: row.get("equipment_display_name"),
        status: MaintenanceStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown maintenance status: {}", status))?,
        scheduled_for: row.get("scheduled_for"),
        created_by: row.get("created_by"),
    })
}

fn notification_from_row(row: &PgRow) -> Notification {
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        message: row.get("message"),
        equipment_id: row.get("equipment_id"),
        read: row.get("read"),
        event_date: row.get("event_date"),
        created_at: row.get("created_at"),
    }
}

const EQUIPMENT_COLUMNS: &str =
    "id, display_name, status, last_maintenance, maintenance_interval_days";
const MAINTENANCE_COLUMNS: &str =
    "id, equipment_id, equipment_display_name, status, scheduled_for, created_by";
const NOTIFICATION_COLUMNS: &str =
    "id, user_id, message, equipment_id, read, event_date, created_at";

#[async_trait]
impl MaintenanceStore for PgStore {
    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }

    async fn find_profile(&self, uid: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT uid, email, display_name, role, status FROM profiles WHERE uid = $1",
        )
        .bind(uid)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let rows = sqlx::query(
            "SELECT uid, email, display_name, role, status FROM profiles \
             ORDER BY display_name",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(profile_from_row).collect()
    }

    async fn active_equipment(&self) -> Result<Vec<Equipment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM equipment WHERE status = $1 ORDER BY display_name",
            EQUIPMENT_COLUMNS
        ))
        .bind(EquipmentStatus::Active.as_str())
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(equipment_from_row).collect()
    }

    async fn list_equipment(&self) -> Result<Vec<Equipment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM equipment ORDER BY display_name",
            EQUIPMENT_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(equipment_from_row).collect()
    }

    async fn find_equipment(&self, id: Uuid) -> Result<Option<Equipment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM equipment WHERE id = $1",
            EQUIPMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(equipment_from_row).transpose()
    }

    async fn scheduled_maintenance_due(
        &self,
        cutoff: Date,
    ) -> Result<Vec<ScheduledMaintenance>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_maintenance \
             WHERE status = $1 AND scheduled_for <= $2 \
             ORDER BY scheduled_for",
            MAINTENANCE_COLUMNS
        ))
        .bind(MaintenanceStatus::Scheduled.as_str())
        .bind(cutoff)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(maintenance_from_row).collect()
    }

    async fn scheduled_for_equipment(
        &self,
        equipment_id: Uuid,
    ) -> Result<Vec<ScheduledMaintenance>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_maintenance \
             WHERE equipment_id = $1 \
             ORDER BY scheduled_for DESC",
            MAINTENANCE_COLUMNS
        ))
        .bind(equipment_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(maintenance_from_row).collect()
    }

    async fn list_scheduled_maintenance(&self) -> Result<Vec<ScheduledMaintenance>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_maintenance ORDER BY scheduled_for DESC",
            MAINTENANCE_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(maintenance_from_row).collect()
    }

    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(notification_from_row).collect())
    }

    async fn subscribe_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<watch::Receiver<Vec<Notification>>> {
        let items = self.notifications_for(user_id).await?;
        let mut feeds = self.feeds.lock().unwrap();
        let receiver = match feeds.get(&user_id) {
            Some(sender) => {
                sender.send_replace(items);
                sender.subscribe()
            }
            None => {
                let (sender, receiver) = watch::channel(items);
                feeds.insert(user_id, sender);
                receiver
            }
        };
        Ok(receiver)
    }

    async fn commit_notifications(
        &self,
        user_id: Uuid,
        batch: NotificationBatch,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.pool().begin().await?;
        for staged in &batch.creates {
            sqlx::query(
                "INSERT INTO notifications (user_id, message, equipment_id, read, event_date) \
                 VALUES ($1, $2, $3, FALSE, $4)",
            )
            .bind(user_id)
            .bind(&staged.message)
            .bind(staged.equipment_id)
            .bind(staged.event_date)
            .execute(&mut *tx)
            .await?;
        }
        for id in &batch.reads {
            sqlx::query(
                "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2",
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.push_snapshot(user_id).await
    }
}
