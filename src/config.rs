use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use which::which;

use crate::{NotesError, Result};

const CONFIG_FILE: &str = "config.json";

/// Shortest clipboard poll period
const MIN_CLIPBOARD_POLL_MS: u64 = 50;

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory where notes are stored
    pub notes_dir: PathBuf,

    /// Directory for non-authoritative UI state (sidebar)
    pub app_data_dir: PathBuf,

    /// Idle window before sidebar state is written (milliseconds)
    pub sidebar_debounce_ms: u64,

    /// Delay between a clipboard notification and its classification (milliseconds)
    pub clipboard_debounce_ms: u64,

    /// How often the system clipboard is polled (milliseconds)
    pub clipboard_poll_ms: u64,

    /// How long an invalid-link warning stays visible (milliseconds)
    pub invalid_url_warning_ms: u64,

    /// Save automatically after this idle window following an edit (milliseconds)
    pub autosave_ms: Option<u64>,

    /// Browser used when the native opener fails
    pub browser_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".linknotes"));

        Self {
            notes_dir: data_dir.join("notes"),
            app_data_dir: data_dir.join("app_data"),
            sidebar_debounce_ms: 500,
            clipboard_debounce_ms: 100,
            clipboard_poll_ms: 500,
            invalid_url_warning_ms: 3000,
            autosave_ms: None,
            browser_command: None,
        }
    }
}

fn at_least(field: &str, ms: u64, min: u64) -> Duration {
    if ms < min {
        warn!("{} of {}ms is too short, using {}ms", field, ms, min);
    }
    Duration::from_millis(ms.max(min))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "linknotes")
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Loads the configuration from `path`, or from the default location.
    ///
    /// A missing file yields the defaults; missing fields take their default values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                warn!("No configuration directory available, using defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| NotesError::ConfigError {
                message: format!("Invalid configuration in {}: {}", path.display(), e),
            })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| NotesError::DirectoryError {
                path: parent.to_path_buf(),
            })?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Configuration written to {}", path.display());
        Ok(())
    }

    pub fn sidebar_debounce(&self) -> Duration {
        at_least("sidebar_debounce_ms", self.sidebar_debounce_ms, 1)
    }

    pub fn clipboard_debounce(&self) -> Duration {
        at_least("clipboard_debounce_ms", self.clipboard_debounce_ms, 1)
    }

    pub fn clipboard_poll_interval(&self) -> Duration {
        at_least("clipboard_poll_ms", self.clipboard_poll_ms, MIN_CLIPBOARD_POLL_MS)
    }

    pub fn invalid_url_warning(&self) -> Duration {
        Duration::from_millis(self.invalid_url_warning_ms)
    }

    pub fn autosave_delay(&self) -> Option<Duration> {
        self.autosave_ms.map(|ms| at_least("autosave_ms", ms, 1))
    }

    /// Browser command used as the fallback link opener, if one can be found
    pub fn get_browser_command(&self) -> Option<String> {
        if let Some(browser) = &self.browser_command {
            return Some(browser.clone());
        }

        if let Ok(browser) = std::env::var("BROWSER") {
            if !browser.trim().is_empty() {
                return Some(browser);
            }
        }

        let candidates: &[&str] = if cfg!(windows) {
            &["msedge", "chrome", "firefox"]
        } else if cfg!(target_os = "macos") {
            &["open"]
        } else {
            &["xdg-open", "firefox", "chromium", "google-chrome"]
        };

        candidates
            .iter()
            .find(|candidate| which(candidate).is_ok())
            .map(|candidate| candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sidebar_debounce(), Duration::from_millis(500));
        assert_eq!(config.clipboard_debounce(), Duration::from_millis(100));
        assert!(config.autosave_delay().is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "notes_dir": "/tmp/n", "autosave_ms": 2000 }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.notes_dir, PathBuf::from("/tmp/n"));
        assert_eq!(config.autosave_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(config.clipboard_poll_ms, 500);
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let config = Config {
            clipboard_poll_ms: 0,
            clipboard_debounce_ms: 0,
            sidebar_debounce_ms: 0,
            autosave_ms: Some(0),
            ..Config::default()
        };
        assert_eq!(config.clipboard_poll_interval(), Duration::from_millis(50));
        assert_eq!(config.clipboard_debounce(), Duration::from_millis(1));
        assert_eq!(config.sidebar_debounce(), Duration::from_millis(1));
        assert_eq!(config.autosave_delay(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn invalid_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(NotesError::ConfigError { .. })
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            browser_command: Some("firefox --new-tab".into()),
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn configured_browser_wins() {
        let config = Config {
            browser_command: Some("my-browser".into()),
            ..Config::default()
        };
        assert_eq!(config.get_browser_command().as_deref(), Some("my-browser"));
    }
}
