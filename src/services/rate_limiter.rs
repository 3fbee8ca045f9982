use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Deny { retry_after: Duration },
}

pub trait RateLimiter: Send + Sync {
    /// Records an attempt for `key` if it fits within `limit` per `window`.
    fn check(&self, key: &str, limit: u32, window: Duration) -> RateDecision;
}

/// In-process sliding window keyed by client.
///
/// Denied attempts are not recorded, so a client that keeps retrying is let
/// back in as soon as its oldest accepted attempt leaves the window.
#[derive(Default)]
pub struct SlidingWindowLimiter {
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateDecision {
        let mut hits = self.hits.lock().unwrap_or_else(|p| p.into_inner());

        // Forget clients whose whole history has aged out.
        hits.retain(|_, stamps| stamps.back().map_or(false, |last| now.duration_since(*last) < window));

        let stamps = hits.entry(key.to_string()).or_default();
        while stamps
            .front()
            .map_or(false, |first| now.duration_since(*first) >= window)
        {
            stamps.pop_front();
        }

        if stamps.len() >= limit as usize {
            let retry_after = stamps
                .front()
                .map(|first| window.saturating_sub(now.duration_since(*first)))
                .unwrap_or(window);
            return RateDecision::Deny { retry_after };
        }

        stamps.push_back(now);
        RateDecision::Allow
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        self.check_at(key, limit, window, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn sixth_attempt_in_window_is_denied() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();
        for i in 0..5 {
            let at = start + Duration::from_secs(i);
            assert_eq!(limiter.check_at("client", 5, WINDOW, at), RateDecision::Allow);
        }
        let decision = limiter.check_at("client", 5, WINDOW, start + Duration::from_secs(10));
        assert_eq!(
            decision,
            RateDecision::Deny {
                retry_after: Duration::from_secs(50)
            }
        );
    }

    #[test]
    fn window_slides() {
        let limiter = SlidingWindowLimiter::new();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.check_at("client", 5, WINDOW, start);
        }
        assert_eq!(
            limiter.check_at("client", 5, WINDOW, start + WINDOW),
            RateDecision::Allow
        );
    }

    #[test]
    fn clients_are_independent() {
        let limiter = SlidingWindowLimiter::new();
        let now = Instant::now();
        for _ in 0..5 {
            limiter.check_at("a", 5, WINDOW, now);
        }
        assert!(matches!(limiter.check_at("a", 5, WINDOW, now), RateDecision::Deny { .. }));
        assert_eq!(limiter.check_at("b", 5, WINDOW, now), RateDecision::Allow);
    }
}
