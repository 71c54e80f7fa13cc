//! Application-level configuration loading for paths, timers, and listeners.

use std::{
    env, fs,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "EVENT_CURRENCY_CONFIG_PATH";
/// Directory holding the persisted balances file when none is configured.
const DEFAULT_DATA_DIR: &str = "data";
/// Delay between a mutation and the debounced save it requests.
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;
/// Period of the save-if-dirty autosave sweep.
const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    data_dir: PathBuf,
    save_debounce: Duration,
    autosave_interval: Duration,
    bridge_addr: SocketAddr,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Directory containing the persisted balances file.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Delay applied between a mutation and its debounced save.
    pub fn save_debounce(&self) -> Duration {
        self.save_debounce
    }

    /// Interval of the periodic save-if-dirty sweep.
    pub fn autosave_interval(&self) -> Duration {
        self.autosave_interval
    }

    /// Socket address the bridge listener binds.
    pub fn bridge_addr(&self) -> SocketAddr {
        self.bridge_addr
    }

    /// Build a configuration pointing at a scratch directory with short timers.
    #[cfg(test)]
    pub(crate) fn for_tests(
        data_dir: PathBuf,
        save_debounce: Duration,
        autosave_interval: Duration,
    ) -> Self {
        Self {
            data_dir,
            save_debounce,
            autosave_interval,
            ..Self::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            save_debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            autosave_interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            bridge_addr: SocketAddr::from(([0, 0, 0, 0], 25580)),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_dir: Option<PathBuf>,
    save_debounce_ms: Option<u64>,
    autosave_interval_secs: Option<u64>,
    bridge_addr: Option<SocketAddr>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: value.data_dir.unwrap_or(defaults.data_dir),
            save_debounce: value
                .save_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.save_debounce),
            autosave_interval: value
                .autosave_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.autosave_interval),
            bridge_addr: value.bridge_addr.unwrap_or(defaults.bridge_addr),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
