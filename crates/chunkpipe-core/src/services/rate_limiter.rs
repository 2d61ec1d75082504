//! Per-model sliding-window rate limiter
//!
//! Each model key gets a window of request timestamps (and token counts)
//! covering the trailing 60 seconds. `admit` suspends the caller until the
//! window holds fewer than the model's `rpm` requests; `record` appends a
//! completed request. Windows are created lazily and kept for the life of
//! the process, only their contents are pruned.
//!
//! Models missing from the registry are not limited.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::registry::ModelRegistry;

/// Length of the sliding window
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Requests and token counts inside one model's trailing window
#[derive(Debug, Default)]
struct RateWindow {
    requests: VecDeque<Instant>,
    tokens: VecDeque<(Instant, u64)>,
}

impl RateWindow {
    /// Drop every entry that has left the window ending at `now`
    fn prune(&mut self, now: Instant) {
        while let Some(&ts) = self.requests.front() {
            if now.duration_since(ts) >= RATE_WINDOW {
                self.requests.pop_front();
            } else {
                break;
            }
        }
        while let Some(&(ts, _)) = self.tokens.front() {
            if now.duration_since(ts) >= RATE_WINDOW {
                self.tokens.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Current window counts for one model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    pub requests: usize,
    pub tokens: u64,
}

/// Admission control over all models
pub struct RateLimiter {
    registry: Arc<ModelRegistry>,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request slot for `model` is free.
    ///
    /// Re-checks the window after every wait: other slots may have freed up,
    /// or other callers may have taken the one we waited for.
    pub async fn admit(&self, model: &str) {
        let Some(rpm) = self.registry.lookup(model).map(|m| m.rpm as usize) else {
            return;
        };

        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let window = windows.entry(model.to_string()).or_default();
                let now = Instant::now();
                window.prune(now);

                match window.requests.front() {
                    Some(&oldest) if window.requests.len() >= rpm => {
                        (oldest + RATE_WINDOW).saturating_duration_since(now)
                    }
                    _ => return,
                }
            };

            log::debug!(
                "Rate limit reached for {} ({} rpm), waiting {} ms",
                model,
                rpm,
                wait.as_millis()
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Record a completed request for `model`
    pub async fn record(&self, model: &str, input_tokens: u64, output_tokens: u64) {
        if self.registry.lookup(model).is_none() {
            return;
        }

        let mut windows = self.windows.lock().await;
        let window = windows.entry(model.to_string()).or_default();
        let now = Instant::now();
        window.requests.push_back(now);
        window.tokens.push_back((now, input_tokens + output_tokens));
    }

    /// Requests and tokens currently inside `model`'s window
    pub async fn usage(&self, model: &str) -> Option<WindowUsage> {
        let mut windows = self.windows.lock().await;
        let window = windows.get_mut(model)?;
        window.prune(Instant::now());
        Some(WindowUsage {
            requests: window.requests.len(),
            tokens: window.tokens.iter().map(|(_, t)| t).sum(),
        })
    }
}
