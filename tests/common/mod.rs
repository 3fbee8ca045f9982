use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use anemi_meets::{
    app_state::AppState,
    notifications::{NotificationEvent, Notifier},
    repositories::memory_repository::MemoryInviteRepository,
    routes::app_routes::create_router,
    services::{
        clock::ManualClock,
        invitation_service::{InviteService, InviteSettings},
        jwt_service::JwtKeys,
        rate_limiter::SlidingWindowLimiter,
    },
};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";
pub const ADMIN: &str = "admin-1";

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub events: mpsc::Receiver<NotificationEvent>,
    pub keys: JwtKeys,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap()
}

impl TestApp {
    pub fn new() -> Self {
        Self::behind_proxies(0)
    }

    pub fn behind_proxies(hops: usize) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let (notifier, events) = Notifier::channel(64);
        let service = InviteService::new(
            Arc::new(MemoryInviteRepository::new()),
            notifier,
            Arc::new(SlidingWindowLimiter::new()),
            clock.clone(),
            InviteSettings {
                public_base_url: "https://meets.example".to_string(),
                ..InviteSettings::default()
            },
        );
        let keys = JwtKeys::new(SECRET);
        let admins: HashSet<String> = [ADMIN.to_string()].into_iter().collect();
        let state = AppState::new(Arc::new(service), keys.clone(), admins).with_trusted_proxy_hops(hops);
        let router = create_router(state);

        Self {
            router,
            clock,
            events,
            keys,
        }
    }

    pub fn bearer(&self, subject: &str, email: Option<&str>) -> String {
        format!("Bearer {}", self.keys.issue(subject, email).unwrap())
    }

    pub async fn send(&self, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.send_from(method, uri, auth, body, "198.51.100.1", None).await
    }

    /// Sends as if connected from `peer`, optionally through a proxy chain.
    pub async fn send_from(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
        peer: &str,
        forwarded_for: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(forwarded_for) = forwarded_for {
            builder = builder.header("x-forwarded-for", forwarded_for);
        }
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let mut request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    /// Events queued so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn create_body() -> Value {
    serde_json::json!({
        "organizerName": "Ana",
        "organizerEmail": "ana@example.com",
        "cafeId": "cafe-1",
        "dates": ["2025-06-01", "2025-06-02"],
        "times": ["09:00", "15:30"]
    })
}

pub fn accept_body() -> Value {
    serde_json::json!({
        "inviteeName": "Bo",
        "inviteeEmail": "bo@example.com",
        "chosenDate": "2025-06-02",
        "chosenTime": "15:30"
    })
}
