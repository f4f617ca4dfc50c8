//! Fixed-window request limiter keyed by client address.
//!
//! Bounds cost exposure to the external model provider: requests beyond
//! the per-client limit are rejected immediately at the HTTP edge, never
//! queued, before any validation or model call runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracked clients above which stale windows are purged opportunistically.
const PURGE_THRESHOLD: usize = 1024;

/// The limit was reached for the current window.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("rate limit exceeded: {max_requests} requests per {window_secs}s window")]
pub struct RateLimitExceeded {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-process fixed-window limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    /// Create a limiter allowing `max_requests` per `window` per client.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when the client has exhausted the
    /// current window; the request is not counted in that case.
    pub fn check(&self, client: &str) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() > PURGE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.max_requests {
            return Err(RateLimitExceeded {
                max_requests: self.max_requests,
                window_secs: self.window.as_secs(),
            });
        }
        entry.count = entry.count.saturating_add(1);
        Ok(())
    }
}
