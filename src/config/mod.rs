//! Config loading.
//!
//! `SyncConfig` is read from a TOML file, then `BLACKCARD_*` environment
//! variables override individual values.

mod load;
mod schema;

use std::path::PathBuf;

use thiserror::Error;

pub use load::{apply_env_overrides, apply_overrides, load, load_from_path, CONFIG_PATH_VAR};
pub use schema::{BackendConfig, CacheConfig, NotificationConfig, RealtimeConfig, SyncConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
