use directories::BaseDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::api::MessagingApi;
use crate::session::poller::MIN_POLL_INTERVAL;

pub const DEFAULT_POLL_SECS: u64 = 3;

fn default_poll_secs() -> u64 {
    DEFAULT_POLL_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    pub token: Option<String>,
    pub role: Option<String>,
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: String::new(),
            token: None,
            role: None,
            poll_interval_secs: DEFAULT_POLL_SECS,
        }
    }
}

impl Settings {
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("forstek.toml"))
    }

    pub fn load() -> Self {
        match Self::toml_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(text) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str::<Settings>(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        match Self::toml_path() {
            Some(path) => self.save_to(&path),
            None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No config dir")),
        }
    }

    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, toml)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs).max(MIN_POLL_INTERVAL)
    }
}

/// Everything a screen needs from the signed-in session, handed over at construction.
#[derive(Clone)]
pub struct SessionContext {
    pub api: Arc<dyn MessagingApi>,
    pub role: Option<String>,
    pub poll_interval: Duration,
}

impl SessionContext {
    pub fn new(api: Arc<dyn MessagingApi>) -> Self {
        Self {
            api,
            role: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
        }
    }

    pub fn from_settings(api: Arc<dyn MessagingApi>, settings: &Settings) -> Self {
        Self {
            api,
            role: settings.role.clone(),
            poll_interval: settings.poll_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("forstek-settings-{}-{}", std::process::id(), name))
            .join("forstek.toml")
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load_from(&scratch_path("missing"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn save_then_load_keeps_fields() {
        let path = scratch_path("saved");
        let settings = Settings {
            base_url: "https://forstek.example".into(),
            email: "ana@example.com".into(),
            token: Some("abc".into()),
            role: Some("student".into()),
            poll_interval_secs: 5,
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_fills_in_poll_interval() {
        let path = scratch_path("partial");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "base_url = \"http://localhost:5000\"\n").unwrap();
        let settings = Settings::load_from(&path);
        assert_eq!(settings.base_url, "http://localhost:5000");
        assert_eq!(settings.poll_interval_secs, DEFAULT_POLL_SECS);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let settings = Settings { poll_interval_secs: 0, ..Settings::default() };
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
    }
}
