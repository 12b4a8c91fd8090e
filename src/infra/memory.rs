use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::equipment::{Equipment, EquipmentStatus};
use crate::domain::maintenance::{MaintenanceStatus, ScheduledMaintenance};
use crate::domain::notification::Notification;
use crate::domain::profile::Profile;
use crate::infra::store::{MaintenanceStore, NotificationBatch};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    equipment: Vec<Equipment>,
    maintenance: Vec<ScheduledMaintenance>,
    notifications: HashMap<Uuid, Vec<Notification>>,
    commits: u64,
}

/// In-memory document store, the `STORE_BACKEND=memory` dev backend and the
/// test suite's store. Behaves like the Postgres backend, including the
/// post-commit snapshot push.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    feeds: Mutex<HashMap<Uuid, watch::Sender<Vec<Notification>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.tables
            .lock()
            .unwrap()
            .profiles
            .insert(profile.uid, profile);
    }

    pub fn insert_equipment(&self, equipment: Equipment) {
        self.tables.lock().unwrap().equipment.push(equipment);
    }

    pub fn insert_maintenance(&self, maintenance: ScheduledMaintenance) {
        self.tables.lock().unwrap().maintenance.push(maintenance);
    }

    /// Number of committed (non-empty) batches since construction.
    pub fn commit_count(&self) -> u64 {
        self.tables.lock().unwrap().commits
    }

    fn sorted_notifications(tables: &Tables, user_id: Uuid) -> Vec<Notification> {
        let mut items = tables
            .notifications
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        items
    }

    fn push_snapshot(&self, user_id: Uuid, items: Vec<Notification>) {
        if let Some(sender) = self.feeds.lock().unwrap().get(&user_id) {
            sender.send_replace(items);
        }
    }
}

#[async_trait]
impl MaintenanceStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_profile(&self, uid: Uuid) -> Result<Option<Profile>> {
        Ok(self.tables.lock().unwrap().profiles.get(&uid).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut profiles: Vec<Profile> = self
            .tables
            .lock()
            .unwrap()
            .profiles
            .values()
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(profiles)
    }

    async fn active_equipment(&self) -> Result<Vec<Equipment>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .equipment
            .iter()
            .filter(|e| e.status == EquipmentStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_equipment(&self) -> Result<Vec<Equipment>> {
        Ok(self.tables.lock().unwrap().equipment.clone())
    }

    async fn find_equipment(&self, id: Uuid) -> Result<Option<Equipment>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .equipment
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn scheduled_maintenance_due(
        &self,
        cutoff: Date,
    ) -> Result<Vec<ScheduledMaintenance>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .maintenance
            .iter()
            .filter(|m| m.status == MaintenanceStatus::Scheduled && m.scheduled_for <= cutoff)
            .cloned()
            .collect())
    }

    async fn scheduled_for_equipment(
        &self,
        equipment_id: Uuid,
    ) -> Result<Vec<ScheduledMaintenance>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .maintenance
            .iter()
            .filter(|m| m.equipment_id == equipment_id)
            .cloned()
            .collect())
    }

    async fn list_scheduled_maintenance(&self) -> Result<Vec<ScheduledMaintenance>> {
        Ok(self.tables.lock().unwrap().maintenance.clone())
    }

    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let tables = self.tables.lock().unwrap();
        Ok(Self::sorted_notifications(&tables, user_id))
    }

    async fn subscribe_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<watch::Receiver<Vec<Notification>>> {
        let items = {
            let tables = self.tables.lock().unwrap();
            Self::sorted_notifications(&tables, user_id)
        };
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

        let items = {
            let mut tables = self.tables.lock().unwrap();
            let now = OffsetDateTime::now_utc();
            let entries = tables.notifications.entry(user_id).or_default();
            for staged in batch.creates {
                entries.push(Notification {
                    id: Uuid::new_v4(),
                    user_id,
                    message: staged.message,
                    equipment_id: staged.equipment_id,
                    read: false,
                    event_date: staged.event_date,
                    created_at: now,
                });
            }
            for id in batch.reads {
                if let Some(entry) = entries.iter_mut().find(|n| n.id == id) {
                    entry.read = true;
                }
            }
            tables.commits += 1;
            Self::sorted_notifications(&tables, user_id)
        };

        self.push_snapshot(user_id, items);
        Ok(())
    }
}
