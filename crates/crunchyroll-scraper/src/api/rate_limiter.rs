//! Rate limiter shared by concurrent scan tasks.
//!
//! Enforces both per-second and per-minute rate limits for API requests.
//! The window state sits behind an async mutex, so callers queue up in
//! arrival order while one of them sleeps out the limit.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

const MINUTE: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Window {
    /// Last request timestamp
    last_request: Option<Instant>,
    /// Request timestamps in the last minute
    recent_requests: Vec<Instant>,
}

/// Rate limiter with dual constraints (per-second and per-minute)
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_per_minute: usize,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(max_per_second: f64, max_per_minute: u32) -> Self {
        let min_interval = if max_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / max_per_second)
        } else {
            Duration::ZERO
        };

        Self {
            min_interval,
            max_per_minute: max_per_minute.max(1) as usize,
            window: Mutex::new(Window::default()),
        }
    }

    /// Wait until a request can be made, respecting both rate limits
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;
        let now = Instant::now();

        window
            .recent_requests
            .retain(|&timestamp| now.duration_since(timestamp) < MINUTE);

        if window.recent_requests.len() >= self.max_per_minute {
            if let Some(&oldest) = window.recent_requests.first() {
                let wait_time = MINUTE.saturating_sub(now.duration_since(oldest));
                tracing::debug!(
                    wait_ms = wait_time.as_millis(),
                    "Rate limit: waiting for per-minute limit"
                );
                sleep(wait_time).await;
            }
        }

        if let Some(last) = window.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!(
                    wait_ms = wait_time.as_millis(),
                    "Rate limit: waiting for per-second limit"
                );
                sleep(wait_time).await;
            }
        }

        let request_time = Instant::now();
        window.last_request = Some(request_time);
        window.recent_requests.push(request_time);
    }

    /// Get the current number of requests in the last minute
    pub async fn current_minute_count(&self) -> usize {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        window
            .recent_requests
            .retain(|&timestamp| now.duration_since(timestamp) < MINUTE);
        window.recent_requests.len()
    }
}
