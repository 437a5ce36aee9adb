//! Fixed-window request throttling keyed by client address.
//!
//! Two windows are configured: a general one covering every route and a
//! stricter one on the sign-in endpoint. Counters live in a `DashMap`
//! and stale windows are swept opportunistically.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

const SWEEP_THRESHOLD: usize = 10_000;

pub struct FixedWindow {
    window: Duration,
    max: u32,
    hits: DashMap<(String, u64), u32>,
}

impl FixedWindow {
    pub fn new(window_secs: u64, max: u32) -> Self {
        Self {
            window: Duration::from_secs(window_secs.max(1)),
            max,
            hits: DashMap::new(),
        }
    }

    fn window_index(&self, now: SystemTime) -> u64 {
        now.duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            / self.window.as_secs()
    }

    /// Records one hit for `key` and reports whether it is still within
    /// the window's allowance.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, SystemTime::now())
    }

    fn allow_at(&self, key: &str, now: SystemTime) -> bool {
        let index = self.window_index(now);
        let count = {
            let mut entry = self.hits.entry((key.to_string(), index)).or_insert(0);
            *entry += 1;
            *entry
        };
        if self.hits.len() > SWEEP_THRESHOLD {
            self.hits.retain(|(_, w), _| *w == index);
        }
        count <= self.max
    }
}

/// Best-effort client key: proxy header first, then the peer address.
fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit(
    State(window): State<std::sync::Arc<FixedWindow>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);
    if !window.allow(&key) {
        tracing::warn!(client = %key, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please slow down.",
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_cap_then_rejects() {
        let window = FixedWindow::new(60, 3);
        let now = SystemTime::now();
        assert!(window.allow_at("10.0.0.1", now));
        assert!(window.allow_at("10.0.0.1", now));
        assert!(window.allow_at("10.0.0.1", now));
        assert!(!window.allow_at("10.0.0.1", now));
    }

    #[test]
    fn keys_are_counted_independently() {
        let window = FixedWindow::new(60, 1);
        let now = SystemTime::now();
        assert!(window.allow_at("a", now));
        assert!(window.allow_at("b", now));
        assert!(!window.allow_at("a", now));
    }

    #[test]
    fn a_new_window_resets_the_count() {
        let window = FixedWindow::new(10, 1);
        let start = UNIX_EPOCH + Duration::from_secs(1_000_000);
        assert!(window.allow_at("a", start));
        assert!(!window.allow_at("a", start));
        assert!(window.allow_at("a", start + Duration::from_secs(10)));
    }
}
