//! Attempt limiting for credential and OTP endpoints
//!
//! Counts attempts per key (an action plus a phone number or user id).
//! Exceeding the budget inside the window locks the key out for a while.

use common::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AttemptLimiterConfig {
    /// Attempts allowed inside one window
    pub max_attempts: u32,
    pub window: Duration,
    pub lockout: Duration,
}

impl Default for AttemptLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(300),
            lockout: Duration::from_secs(900),
        }
    }
}

#[derive(Debug)]
struct AttemptWindow {
    attempts: u32,
    started: Instant,
    locked_until: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct AttemptLimiter {
    config: AttemptLimiterConfig,
    windows: Arc<Mutex<HashMap<String, AttemptWindow>>>,
}

impl AttemptLimiter {
    pub fn new(config: AttemptLimiterConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record one attempt for `key`, failing with `TooManyRequests` when the
    /// key is locked out or has used up its budget
    pub async fn check(&self, key: &str) -> AppResult<()> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        let window = windows.entry(key.to_string()).or_insert(AttemptWindow {
            attempts: 0,
            started: now,
            locked_until: None,
        });

        if let Some(until) = window.locked_until {
            if now < until {
                return Err(too_many());
            }
            window.locked_until = None;
            window.attempts = 0;
            window.started = now;
        }

        if now.duration_since(window.started) >= self.config.window {
            window.attempts = 0;
            window.started = now;
        }

        if window.attempts >= self.config.max_attempts {
            window.locked_until = Some(now + self.config.lockout);
            warn!(
                "Locked out {} for {} seconds",
                key,
                self.config.lockout.as_secs()
            );
            return Err(too_many());
        }

        window.attempts += 1;
        Ok(())
    }

    /// Forget the attempts for `key` after a successful action
    pub async fn reset(&self, key: &str) {
        self.windows.lock().await.remove(key);
    }
}

fn too_many() -> AppError {
    AppError::TooManyRequests("Too many attempts, please try again later".to_string())
}
