use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::try_join;
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::notification::{dedup_key, Notification};
use crate::domain::profile::Profile;
use crate::infra::store::{MaintenanceStore, NewNotification, NotificationBatch};

/// The engine's reactive output: full list newest-created-first plus the
/// derived unread count.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    pub items: Vec<Notification>,
    pub unread: usize,
}

impl NotificationFeed {
    fn from_items(items: Vec<Notification>) -> Self {
        let unread = items.iter().filter(|n| !n.read).count();
        Self { items, unread }
    }
}

/// Generates maintenance reminders at session start and mirrors the user's
/// notification collection through the store's snapshot subscription.
pub struct NotificationEngine {
    store: Arc<dyn MaintenanceStore>,
    window_days: i64,
    regenerate_after_failure: bool,
    feed: Arc<watch::Sender<NotificationFeed>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    generated: AtomicBool,
}

impl NotificationEngine {
    pub fn new(
        store: Arc<dyn MaintenanceStore>,
        window_days: i64,
        regenerate_after_failure: bool,
    ) -> Self {
        let (feed, _) = watch::channel(NotificationFeed::default());
        Self {
            store,
            window_days,
            regenerate_after_failure,
            feed: Arc::new(feed),
            listener: Mutex::new(None),
            generated: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> NotificationFeed {
        self.feed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationFeed> {
        self.feed.subscribe()
    }

    /// Opens the live subscription for the session user. Any previous
    /// listener is cancelled first; the initial snapshot is applied before
    /// this returns, every later delivery replaces the feed wholesale.
    pub async fn start_session(&self, profile: &Profile) -> Result<()> {
        self.stop_listener();

        let mut deliveries = self.store.subscribe_notifications(profile.uid).await?;
        let initial = deliveries.borrow_and_update().clone();
        self.feed.send_replace(NotificationFeed::from_items(initial));

        let feed = Arc::clone(&self.feed);
        let handle = tokio::spawn(async move {
            while deliveries.changed().await.is_ok() {
                let items = deliveries.borrow_and_update().clone();
                feed.send_replace(NotificationFeed::from_items(items));
            }
        });
        *self.listener.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Synthesizes reminders falling due inside the lookahead window. Runs at
    /// most once per session; re-entry while the guard is set is a no-op. A
    /// failed pass keeps the guard set unless configured to re-arm it.
    pub async fn generate_pending(&self, profile: &Profile) -> Result<()> {
        if self.generated.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.run_generation(profile).await;
        if result.is_err() && self.regenerate_after_failure {
            self.generated.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn run_generation(&self, profile: &Profile) -> Result<()> {
        let today = OffsetDateTime::now_utc().date();
        let window_end = today + Duration::days(self.window_days);

        let existing = self.store.notifications_for(profile.uid).await?;
        // One staging set seeded with the existing keys covers both kinds of
        // duplicate: against stored records and between the two sources of
        // the same pass (first staged wins).
        let mut staged: HashSet<String> =
            existing.iter().map(Notification::dedup_key).collect();

        let (equipment, scheduled) = try_join!(
            self.store.active_equipment(),
            self.store.scheduled_maintenance_due(window_end),
        )?;

        let mut batch = NotificationBatch::new();

        for item in equipment {
            // Equipment with no recorded maintenance has no cycle to project.
            let Some(next_due) = item.next_due() else {
                continue;
            };
            if next_due < today || next_due > window_end {
                continue;
            }
            if staged.insert(dedup_key(item.id, next_due)) {
                batch.stage(NewNotification {
                    message: format!(
                        "Mantenimiento por ciclo para \"{}\" está próximo.",
                        item.display_name
                    ),
                    equipment_id: item.id,
                    event_date: next_due,
                });
            }
        }

        for item in scheduled {
            if !profile.is_admin() && item.created_by != profile.uid {
                continue;
            }
            if staged.insert(dedup_key(item.equipment_id, item.scheduled_for)) {
                batch.stage(NewNotification {
                    message: format!(
                        "Hay un mantenimiento programado para \"{}\".",
                        item.equipment_display_name
                    ),
                    equipment_id: item.equipment_id,
                    event_date: item.scheduled_for,
                });
            }
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.store.commit_notifications(profile.uid, batch).await
    }

    /// No-op when nothing is unread; otherwise one atomic batch of read-flag
    /// updates. Local state is not touched, the subscription redelivery is
    /// the source of truth.
    pub async fn mark_all_read(&self, profile: &Profile) -> Result<()> {
        let current = self.snapshot();
        if current.unread == 0 {
            return Ok(());
        }
        let mut batch = NotificationBatch::new();
        for item in current.items.iter().filter(|n| !n.read) {
            batch.flag_read(item.id);
        }
        self.store.commit_notifications(profile.uid, batch).await
    }

    /// Session teardown: cancel the listener, clear the feed, re-arm the
    /// generation guard for the next login.
    pub fn end_session(&self) {
        self.stop_listener();
        self.feed.send_replace(NotificationFeed::default());
        self.generated.store(false, Ordering::SeqCst);
    }

    fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().unwrap().take() {
            handle.abort();
        }
    }
}
