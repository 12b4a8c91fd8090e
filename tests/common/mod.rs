#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use mantto::app::notifications::NotificationFeed;
use mantto::config::AppConfig;
use mantto::domain::equipment::{Equipment, EquipmentStatus};
use mantto::domain::maintenance::{MaintenanceStatus, ScheduledMaintenance};
use mantto::domain::profile::{AccountStatus, Profile, Role};
use mantto::infra::identity::MemoryIdentity;
use mantto::infra::memory::MemoryStore;
use mantto::infra::prefs::MemoryPrefs;
use mantto::{http, AppState};

pub const DEFAULT_PASSWORD: &str = "testpassword123";

// ---------------------------------------------------------------------------
// TestApp — the real router over in-memory backends
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<MemoryIdentity>,
    pub prefs: Arc<MemoryPrefs>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").and_then(|v| v.to_str().ok())
    }
}

pub struct TestUser {
    pub uid: Uuid,
    pub email: String,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        http_addr: "127.0.0.1:0".into(),
        store_backend: "memory".into(),
        database_url: None,
        db_max_connections: 5,
        db_connect_timeout_seconds: 5,
        db_idle_timeout_seconds: 300,
        db_max_lifetime_seconds: 1800,
        prefs_path: "unused".into(),
        default_theme: "light".into(),
        reminder_window_days: 7,
        regenerate_after_failure: false,
    }
}

impl TestApp {
    pub async fn setup() -> Self {
        Self::setup_with(test_config()).await
    }

    pub async fn setup_with(config: AppConfig) -> Self {
        Self::with_prefs(config, Arc::new(MemoryPrefs::new())).await
    }

    pub async fn with_prefs(config: AppConfig, prefs: Arc<MemoryPrefs>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(MemoryIdentity::new());

        let state = AppState::build(
            store.clone(),
            identity.clone(),
            prefs.clone(),
            &config,
        )
        .await
        .expect("failed to build AppState");
        let router = http::router(state.clone());

        TestApp {
            router,
            state,
            store,
            identity,
            prefs,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helpers
    // ------------------------------------------------------------------

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, None, token).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: Value,
        token: Option<&str>,
    ) -> TestResponse {
        self.request(Method::POST, path, Some(body), token).await
    }

    // ------------------------------------------------------------------
    // Data seeding
    // ------------------------------------------------------------------

    /// Register credentials plus a stored profile. Returns the new user.
    pub fn create_user(&self, suffix: &str, role: Role, status: AccountStatus) -> TestUser {
        let email = format!("test_{}@example.com", suffix);
        let display_name = format!("Test User {}", suffix);
        let uid = self
            .identity
            .register(&email, DEFAULT_PASSWORD, Some(&display_name))
            .expect("register failed");
        self.store.insert_profile(Profile {
            uid,
            email: email.clone(),
            display_name,
            role,
            status,
        });
        TestUser { uid, email }
    }

    /// Register credentials only, leaving no stored profile behind.
    pub fn create_identity_only(&self, suffix: &str) -> TestUser {
        let email = format!("{}@example.com", suffix);
        let uid = self
            .identity
            .register(&email, DEFAULT_PASSWORD, None)
            .expect("register failed");
        TestUser { uid, email }
    }

    /// Active equipment; `last_maintenance_days_ago` of None means no
    /// maintenance was ever recorded.
    pub fn create_equipment(
        &self,
        name: &str,
        last_maintenance_days_ago: Option<i64>,
        interval_days: i64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let today = OffsetDateTime::now_utc().date();
        self.store.insert_equipment(Equipment {
            id,
            display_name: name.to_string(),
            status: EquipmentStatus::Active,
            last_maintenance: last_maintenance_days_ago.map(|days| today - Duration::days(days)),
            maintenance_interval_days: interval_days,
        });
        id
    }

    /// Scheduled maintenance entry targeting `in_days` from today.
    pub fn create_scheduled(
        &self,
        equipment_id: Uuid,
        name: &str,
        in_days: i64,
        created_by: Uuid,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let scheduled_for = OffsetDateTime::now_utc().date() + Duration::days(in_days);
        self.store.insert_maintenance(ScheduledMaintenance {
            id,
            equipment_id,
            equipment_display_name: name.to_string(),
            status: MaintenanceStatus::Scheduled,
            scheduled_for,
            created_by,
        });
        id
    }

    // ------------------------------------------------------------------
    // Session helpers
    // ------------------------------------------------------------------

    pub async fn login(&self, email: &str) -> String {
        let resp = self
            .post_json(
                "/auth/login",
                json!({ "email": email, "password": DEFAULT_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(
            resp.status,
            StatusCode::OK,
            "login failed: {}",
            resp.error_message()
        );
        resp.json()["token"].as_str().unwrap().to_string()
    }

    pub async fn logout(&self, token: &str) {
        let resp = self.post("/auth/logout", Some(token)).await;
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
    }

    /// Await the engine feed satisfying `pred`, bounded by a short timeout.
    /// Deliveries are asynchronous: a committed batch only becomes visible
    /// once the live subscription redelivers.
    pub async fn wait_for_feed<F>(&self, mut pred: F) -> NotificationFeed
    where
        F: FnMut(&NotificationFeed) -> bool,
    {
        let mut rx = self.state.engine.subscribe();
        tokio::time::timeout(StdDuration::from_secs(2), async {
            loop {
                let current = rx.borrow_and_update().clone();
                if pred(&current) {
                    return current;
                }
                if rx.changed().await.is_err() {
                    panic!("engine feed closed");
                }
            }
        })
        .await
        .expect("timed out waiting for notification feed")
    }
}
