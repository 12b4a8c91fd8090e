use anyhow::Result;
use async_trait::async_trait;
use time::Date;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::equipment::Equipment;
use crate::domain::maintenance::ScheduledMaintenance;
use crate::domain::notification::Notification;
use crate::domain::profile::Profile;

/// A reminder staged by the generation pass, not yet committed.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub message: String,
    pub equipment_id: Uuid,
    pub event_date: Date,
}

/// Atomic multi-document write: staged creates plus read-flag updates.
/// The store commits all of it or none of it.
#[derive(Debug, Default)]
pub struct NotificationBatch {
    pub creates: Vec<NewNotification>,
    pub reads: Vec<Uuid>,
}

impl NotificationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, notification: NewNotification) {
        self.creates.push(notification);
    }

    pub fn flag_read(&mut self, id: Uuid) {
        self.reads.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.reads.is_empty()
    }
}

/// The backing document store: filtered queries, point reads, snapshot
/// subscriptions and atomic batched writes.
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn find_profile(&self, uid: Uuid) -> Result<Option<Profile>>;
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    async fn active_equipment(&self) -> Result<Vec<Equipment>>;
    async fn list_equipment(&self) -> Result<Vec<Equipment>>;
    async fn find_equipment(&self, id: Uuid) -> Result<Option<Equipment>>;

    /// Entries still in estado Programado with a target date at or before
    /// `cutoff`.
    async fn scheduled_maintenance_due(&self, cutoff: Date)
        -> Result<Vec<ScheduledMaintenance>>;
    async fn scheduled_for_equipment(&self, equipment_id: Uuid)
        -> Result<Vec<ScheduledMaintenance>>;
    async fn list_scheduled_maintenance(&self) -> Result<Vec<ScheduledMaintenance>>;

    /// Full notification list for the user, newest created first.
    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>>;

    /// Snapshot subscription: the receiver holds the current full list and is
    /// redelivered wholesale after every committed batch for this user.
    async fn subscribe_notifications(&self, user_id: Uuid)
        -> Result<watch::Receiver<Vec<Notification>>>;

    /// All-or-nothing commit of a staged batch. An empty batch is a no-op.
    async fn commit_notifications(&self, user_id: Uuid, batch: NotificationBatch)
        -> Result<()>;
}
