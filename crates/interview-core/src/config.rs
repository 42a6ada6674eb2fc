use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::backend::DEFAULT_BASE_URL;
use crate::speech::{CommandSpec, DEFAULT_RATE};

pub const BACKEND_URL_ENV: &str = "INTERVIEW_BACKEND_URL";
const APP_DIR: &str = "interview-practice";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub rate: f32,
    /// Falls back to the platform default (`say` / `espeak`) when unset.
    pub synthesizer: Option<CommandSpec>,
    /// No default: recognition stays disabled until a command is configured.
    pub recognizer: Option<CommandSpec>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: DEFAULT_RATE,
            synthesizer: None,
            recognizer: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub request_timeout_secs: u64,
    pub last_role: Option<String>,
    pub speech: SpeechConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend_url: None,
            request_timeout_secs: 60,
            last_role: None,
            speech: SpeechConfig::default(),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_last_role(role: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.last_role = Some(role.to_string());
        config.save()
    }

    /// Env var first, then the config file, then the built-in default.
    pub fn resolved_backend_url(&self) -> String {
        std::env::var(BACKEND_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn app_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert!(config.speech.enabled);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.backend_url = Some("http://interviews.local:9000".into());
        config.last_role = Some("Data Scientist".into());
        config.speech.recognizer = Some(CommandSpec::new("whisper-listen", &["--once"]));
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "last_role": "QA Engineer", "speech": { "enabled": false } }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.last_role.as_deref(), Some("QA Engineer"));
        assert!(!config.speech.enabled);
        assert_eq!(config.speech.rate, DEFAULT_RATE);
        assert_eq!(config.request_timeout_secs, 60);
    }
}
