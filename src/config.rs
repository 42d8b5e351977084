use std::env;
use std::time::Duration;

use log::warn;

use crate::autosave::DEFAULT_QUIET_INTERVAL;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
pub const DEFAULT_PREFS_PATH: &str = "databoard-prefs.json";

/// Runtime settings, read from `DATABOARD_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the canvas backend used by the client side.
    pub api_url: String,
    /// Address the development server listens on.
    pub bind: String,
    pub autosave_interval: Duration,
    pub prefs_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            bind: DEFAULT_BIND.to_string(),
            autosave_interval: DEFAULT_QUIET_INTERVAL,
            prefs_path: DEFAULT_PREFS_PATH.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset or unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let autosave_interval = match lookup("DATABOARD_AUTOSAVE_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    warn!("ignoring invalid DATABOARD_AUTOSAVE_MS={:?}", raw);
                    defaults.autosave_interval
                }
            },
            None => defaults.autosave_interval,
        };
        Config {
            api_url: lookup("DATABOARD_API_URL").unwrap_or(defaults.api_url),
            bind: lookup("DATABOARD_BIND").unwrap_or(defaults.bind),
            autosave_interval,
            prefs_path: lookup("DATABOARD_PREFS").unwrap_or(defaults.prefs_path),
        }
    }
}
