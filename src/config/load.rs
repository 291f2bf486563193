use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{ConfigError, SyncConfig};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "BLACKCARD_CONFIG";

pub fn load_from_path(path: &Path) -> Result<SyncConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `path` (or `$BLACKCARD_CONFIG`, or defaults) and apply env overrides.
///
/// A missing file named by the caller is an error; without any file the
/// defaults are used.
pub fn load(path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    let from_env = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
    let mut config = match path.or(from_env.as_deref()) {
        Some(path) => load_from_path(path)?,
        None => SyncConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn apply_env_overrides(config: &mut SyncConfig) {
    apply_overrides(config, |name| std::env::var(name).ok());
}

/// Apply `BLACKCARD_*` overrides read through `lookup`. Invalid values are
/// logged and ignored.
pub fn apply_overrides(config: &mut SyncConfig, lookup: impl Fn(&str) -> Option<String>) {
    let value = |name: &str| {
        lookup(name)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    };

    if let Some(url) = value("BLACKCARD_BACKEND_URL") {
        config.backend.url = url;
    }
    if let Some(key) = value("BLACKCARD_ANON_KEY") {
        config.backend.anon_key = key;
    }
    if let Some(ms) = parsed::<u64>("BLACKCARD_TIMEOUT_MS", value("BLACKCARD_TIMEOUT_MS")) {
        config.backend.timeout_ms = ms;
    }
    if let Some(ms) = parsed::<u64>("BLACKCARD_STALE_AFTER_MS", value("BLACKCARD_STALE_AFTER_MS")) {
        config.cache.stale_after_ms = (ms > 0).then_some(ms);
    }
    if let Some(enabled) = parsed::<bool>("BLACKCARD_REALTIME", value("BLACKCARD_REALTIME")) {
        config.realtime.enabled = enabled;
    }
    if let Some(ms) = parsed::<u64>("BLACKCARD_POLL_INTERVAL_MS", value("BLACKCARD_POLL_INTERVAL_MS")) {
        config.realtime.poll_interval_ms = (ms > 0).then_some(ms);
    }
    if let Some(success) = parsed::<bool>("BLACKCARD_NOTIFY_SUCCESS", value("BLACKCARD_NOTIFY_SUCCESS")) {
        config.notifications.success = success;
    }
}

fn parsed<T>(name: &str, raw: Option<String>) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("invalid {name}, ignoring: {err}");
            None
        }
    }
}
