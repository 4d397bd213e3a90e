//! Login throttling
//!
//! Counts failed logins per email inside a sliding window. Once the count
//! reaches the limit, further attempts for that email are refused until
//! old failures age out or a login succeeds.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AuthConfig;

/// Failed-login counter keyed by email
pub struct LoginRateLimiter {
    attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.max_login_attempts, Duration::minutes(config.lockout_minutes))
    }

    fn key(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Whether the email has used up its failed attempts
    pub async fn is_limited(&self, email: &str) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;

        match attempts.get_mut(&Self::key(email)) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= self.max_attempts
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.entry(Self::key(email)).or_default().push(Utc::now());
    }

    /// Forget failures for the email (on successful login)
    pub async fn clear(&self, email: &str) {
        self.attempts.write().await.remove(&Self::key(email));
    }

    /// Drop entries whose failures have all aged out
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.attempts.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}
