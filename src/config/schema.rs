use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub backend: BackendConfig,
    pub cache: CacheConfig,
    pub realtime: RealtimeConfig,
    pub notifications: NotificationConfig,
}

/// Hosted backend connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project base url, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public (anon) api key sent with every request.
    pub anon_key: String,
    pub timeout_ms: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which cached data counts as stale. `None` keeps data fresh
    /// until it is invalidated.
    pub stale_after_ms: Option<u64>,
}

impl CacheConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: Some(30_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub enabled: bool,
    /// Periodic refresh used when the change feed is unavailable. `None` disables polling.
    pub poll_interval_ms: Option<u64>,
}

impl RealtimeConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: Some(60_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Notify on successful mutations.
    pub success: bool,
    /// Notify on failed mutations.
    pub errors: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            success: true,
            errors: true,
        }
    }
}
