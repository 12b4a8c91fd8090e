//! Notification Engine Tests
//!
//! Covers the generation pass (window, dedup, visibility), the live feed,
//! mark-all-read and the session lifecycle.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::http::StatusCode;
use common::TestApp;
use time::Date;
use tokio::sync::watch;
use uuid::Uuid;

use mantto::app::notifications::NotificationEngine;
use mantto::domain::equipment::Equipment;
use mantto::domain::maintenance::ScheduledMaintenance;
use mantto::domain::notification::Notification;
use mantto::domain::profile::{AccountStatus, Profile, Role};
use mantto::infra::memory::MemoryStore;
use mantto::infra::store::{MaintenanceStore, NotificationBatch};

// ===========================================================================
// Cyclic maintenance generation
// ===========================================================================

#[tokio::test]
async fn cyclic_due_within_window_generates_one_notification() {
    let app = TestApp::setup().await;
    let user = app.create_user("cyclic", Role::Technician, AccountStatus::Active);
    // Last serviced 27 days ago on a 30-day cycle: due in 3 days.
    app.create_equipment("Compresor A", Some(27), 30);

    let token = app.login(&user.email).await;
    let feed = app.wait_for_feed(|feed| !feed.items.is_empty()).await;

    assert_eq!(feed.items.len(), 1);
    assert!(feed.items[0].message.contains("Compresor A"));
    assert!(!feed.items[0].read);
    assert_eq!(feed.unread, 1);

    let resp = app.get("/notifications", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unread"].as_u64().unwrap(), 1);
}

#[tokio::test]
async fn equipment_without_history_is_skipped() {
    let app = TestApp::setup().await;
    let user = app.create_user("no_history", Role::Technician, AccountStatus::Active);
    app.create_equipment("Equipo Nuevo", None, 30);

    app.login(&user.email).await;

    // Generation completed during login and staged nothing.
    assert_eq!(app.store.commit_count(), 0);
    assert!(app.state.engine.snapshot().items.is_empty());
}

#[tokio::test]
async fn due_beyond_window_is_skipped() {
    let app = TestApp::setup().await;
    let user = app.create_user("far_due", Role::Technician, AccountStatus::Active);
    // Due in 10 days, outside the 7-day window.
    app.create_equipment("Bomba B", Some(20), 30);

    app.login(&user.email).await;

    assert_eq!(app.store.commit_count(), 0);
}

#[tokio::test]
async fn overdue_equipment_is_skipped() {
    let app = TestApp::setup().await;
    let user = app.create_user("overdue", Role::Technician, AccountStatus::Active);
    // Due yesterday: before the window start.
    app.create_equipment("Torre C", Some(31), 30);

    app.login(&user.email).await;

    assert_eq!(app.store.commit_count(), 0);
}

#[tokio::test]
async fn due_today_is_included() {
    let app = TestApp::setup().await;
    let user = app.create_user("due_today", Role::Technician, AccountStatus::Active);
    app.create_equipment("Chiller D", Some(30), 30);

    app.login(&user.email).await;
    let feed = app.wait_for_feed(|feed| !feed.items.is_empty()).await;

    assert_eq!(feed.items.len(), 1);
}

// ===========================================================================
// Deduplication
// ===========================================================================

#[tokio::test]
async fn regeneration_deduplicates_against_existing_records() {
    let app = TestApp::setup().await;
    let user = app.create_user("dedup", Role::Technician, AccountStatus::Active);
    app.create_equipment("Compresor A", Some(27), 30);

    let token = app.login(&user.email).await;
    app.wait_for_feed(|feed| !feed.items.is_empty()).await;
    app.logout(&token).await;

    // The next session re-runs generation but the existing record wins.
    app.login(&user.email).await;
    let feed = app.wait_for_feed(|feed| !feed.items.is_empty()).await;

    assert_eq!(feed.items.len(), 1);
    assert_eq!(app.store.commit_count(), 1);
    let stored = app.state.store.notifications_for(user.uid).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn cyclic_and_scheduled_on_same_day_stage_once() {
    let app = TestApp::setup().await;
    let user = app.create_user("intra_pass", Role::Technician, AccountStatus::Active);
    // Cyclic due in 3 days plus a scheduled entry for the same equipment and
    // date, created by the session user.
    let equipment_id = app.create_equipment("Compresor A", Some(27), 30);
    app.create_scheduled(equipment_id, "Compresor A", 3, user.uid);

    app.login(&user.email).await;
    let feed = app.wait_for_feed(|feed| !feed.items.is_empty()).await;

    // One notification for the (equipment, date) pair; the cyclic source is
    // processed first and wins.
    assert_eq!(feed.items.len(), 1);
    assert!(feed.items[0].message.contains("por ciclo"));
}

// ===========================================================================
// Scheduled-maintenance visibility
// ===========================================================================

#[tokio::test]
async fn scheduled_entry_is_invisible_to_other_technicians() {
    let app = TestApp::setup().await;
    let creator = app.create_user("creator", Role::Technician, AccountStatus::Active);
    let other = app.create_user("other", Role::Technician, AccountStatus::Active);
    let equipment_id = app.create_equipment("Bomba B", None, 30);
    app.create_scheduled(equipment_id, "Bomba B", 2, creator.uid);

    app.login(&other.email).await;

    assert_eq!(app.store.commit_count(), 0);
    assert!(app.state.engine.snapshot().items.is_empty());
}

#[tokio::test]
async fn scheduled_entry_is_visible_to_creator() {
    let app = TestApp::setup().await;
    let creator = app.create_user("creator", Role::Technician, AccountStatus::Active);
    let equipment_id = app.create_equipment("Bomba B", None, 30);
    app.create_scheduled(equipment_id, "Bomba B", 2, creator.uid);

    app.login(&creator.email).await;
    let feed = app.wait_for_feed(|feed| !feed.items.is_empty()).await;

    assert_eq!(feed.items.len(), 1);
    assert!(feed.items[0].message.contains("programado"));
}

#[tokio::test]
async fn scheduled_entry_is_visible_to_admin() {
    let app = TestApp::setup().await;
    let creator = app.create_user("creator", Role::Technician, AccountStatus::Active);
    let admin = app.create_user("admin", Role::Admin, AccountStatus::Active);
    let equipment_id = app.create_equipment("Bomba B", None, 30);
    app.create_scheduled(equipment_id, "Bomba B", 2, creator.uid);

    app.login(&admin.email).await;
    let feed = app.wait_for_feed(|feed| !feed.items.is_empty()).await;

    assert_eq!(feed.items.len(), 1);
}

// ===========================================================================
// Mark-all-read
// ===========================================================================

#[tokio::test]
async fn mark_all_read_flips_every_unread() {
    let app = TestApp::setup().await;
    let user = app.create_user("mark_read", Role::Technician, AccountStatus::Active);
    app.create_equipment("Compresor A", Some(27), 30);
    app.create_equipment("Bomba B", Some(28), 30);

    let token = app.login(&user.email).await;
    app.wait_for_feed(|feed| feed.unread == 2).await;

    let resp = app.post("/notifications/read-all", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    // The subscription redelivery, not an optimistic update, clears the count.
    let feed = app.wait_for_feed(|feed| feed.unread == 0).await;
    assert_eq!(feed.items.len(), 2);
    assert!(feed.items.iter().all(|n| n.read));
    assert_eq!(app.store.commit_count(), 2);
}

#[tokio::test]
async fn mark_all_read_without_unread_commits_nothing() {
    let app = TestApp::setup().await;
    let user = app.create_user("noop_read", Role::Technician, AccountStatus::Active);

    let token = app.login(&user.email).await;
    let resp = app.post("/notifications/read-all", Some(&token)).await;

    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(app.store.commit_count(), 0);
}

// ===========================================================================
// Session lifecycle
// ===========================================================================

#[tokio::test]
async fn logout_clears_feed_and_relogin_regenerates() {
    let app = TestApp::setup().await;
    let user = app.create_user("relogin", Role::Technician, AccountStatus::Active);
    app.create_equipment("Compresor A", Some(27), 30);

    let token = app.login(&user.email).await;
    app.wait_for_feed(|feed| feed.unread == 1).await;

    app.logout(&token).await;

    // Teardown is synchronous: empty list and zero unread before any new
    // subscription delivery.
    let cleared = app.state.engine.snapshot();
    assert!(cleared.items.is_empty());
    assert_eq!(cleared.unread, 0);

    // The generation guard was re-armed; the next session repopulates the
    // feed from the (deduplicated) store.
    app.login(&user.email).await;
    let feed = app.wait_for_feed(|feed| !feed.items.is_empty()).await;
    assert_eq!(feed.items.len(), 1);
}

// ===========================================================================
// Failed generation — retry policy
// ===========================================================================

/// Store wrapper whose equipment query can be switched to fail, for driving
/// the generation failure path.
struct FlakyStore {
    inner: MemoryStore,
    fail: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail: AtomicBool::new(true),
        }
    }

    fn recover(&self) {
        self.fail.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl MaintenanceStore for FlakyStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn find_profile(&self, uid: Uuid) -> Result<Option<Profile>> {
        self.inner.find_profile(uid).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.inner.list_profiles().await
    }

    async fn active_equipment(&self) -> Result<Vec<Equipment>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("store offline"));
        }
        self.inner.active_equipment().await
    }

    async fn list_equipment(&self) -> Result<Vec<Equipment>> {
        self.inner.list_equipment().await
    }

    async fn find_equipment(&self, id: Uuid) -> Result<Option<Equipment>> {
        self.inner.find_equipment(id).await
    }

    async fn scheduled_maintenance_due(&self, cutoff: Date) -> Result<Vec<ScheduledMaintenance>> {
        self.inner.scheduled_maintenance_due(cutoff).await
    }

    async fn scheduled_for_equipment(
        &self,
        equipment_id: Uuid,
    ) -> Result<Vec<ScheduledMaintenance>> {
        self.inner.scheduled_for_equipment(equipment_id).await
    }

    async fn list_scheduled_maintenance(&self) -> Result<Vec<ScheduledMaintenance>> {
        self.inner.list_scheduled_maintenance().await
    }

    async fn notifications_for(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.inner.notifications_for(user_id).await
    }

    async fn subscribe_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<watch::Receiver<Vec<Notification>>> {
        self.inner.subscribe_notifications(user_id).await
    }

    async fn commit_notifications(&self, user_id: Uuid, batch: NotificationBatch) -> Result<()> {
        self.inner.commit_notifications(user_id, batch).await
    }
}

fn technician(name: &str) -> Profile {
    Profile {
        uid: Uuid::new_v4(),
        email: format!("{}@example.com", name),
        display_name: name.to_string(),
        role: Role::Technician,
        status: AccountStatus::Active,
    }
}

fn due_in_days(store: &MemoryStore, name: &str, days: i64) {
    let today = time::OffsetDateTime::now_utc().date();
    store.insert_equipment(Equipment {
        id: Uuid::new_v4(),
        display_name: name.to_string(),
        status: mantto::domain::equipment::EquipmentStatus::Active,
        last_maintenance: Some(today - time::Duration::days(30 - days)),
        maintenance_interval_days: 30,
    });
}

#[tokio::test]
async fn failed_generation_stays_suppressed_by_default() {
    let store = Arc::new(FlakyStore::new());
    due_in_days(&store.inner, "Compresor A", 3);
    let engine = NotificationEngine::new(store.clone(), 7, false);
    let profile = technician("suppressed");

    engine.start_session(&profile).await.unwrap();
    assert!(engine.generate_pending(&profile).await.is_err());

    // The backend recovers, but the session guard is still set.
    store.recover();
    engine.generate_pending(&profile).await.unwrap();
    assert_eq!(store.inner.commit_count(), 0);
}

#[tokio::test]
async fn failed_generation_retries_when_configured() {
    let store = Arc::new(FlakyStore::new());
    due_in_days(&store.inner, "Compresor A", 3);
    let engine = NotificationEngine::new(store.clone(), 7, true);
    let profile = technician("retried");

    engine.start_session(&profile).await.unwrap();
    assert!(engine.generate_pending(&profile).await.is_err());

    store.recover();
    engine.generate_pending(&profile).await.unwrap();
    assert_eq!(store.inner.commit_count(), 1);
    let stored = store.inner.notifications_for(profile.uid).await.unwrap();
    assert_eq!(stored.len(), 1);
}
