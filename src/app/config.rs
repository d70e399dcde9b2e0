// ABOUTME: Application configuration with defaults and file loading
// Supports TOML configuration files, environment variables and API key lookup

use crate::utils::cost_calculator::OcrModel;
use crate::utils::error::{OcrError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the credential, both as environment variable and secrets-file key
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub default_model: OcrModel,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    #[serde(default)]
    pub secrets_path: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
    #[serde(skip)]
    pub debug: bool,
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_tick_rate_ms() -> u64 {
    100
}

fn default_accepted_extensions() -> Vec<String> {
    vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: OcrModel::default(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            tick_rate_ms: default_tick_rate_ms(),
            accepted_extensions: default_accepted_extensions(),
            secrets_path: None,
            log_dir: None,
            config_path: None,
            debug: false,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "gemini-ocr", "gemini-ocr")
}

impl AppConfig {
    pub fn load() -> Self {
        let default_path = project_dirs().map(|dirs| dirs.config_dir().join("config.toml"));
        let mut config = match default_path {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_default(),
            _ => Self::default(),
        };

        config.apply_env_overrides();
        config
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)
            .map_err(|e| OcrError::Config(format!("{}: {}", path.display(), e)))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("GEMINI_OCR_MODEL") {
            if let Some(parsed) = OcrModel::from_str(&model) {
                self.default_model = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("GEMINI_OCR_TIMEOUT") {
            if let Ok(parsed) = timeout.parse() {
                self.request_timeout_secs = parsed;
            }
        }

        if let Ok(base) = std::env::var("GEMINI_OCR_API_BASE") {
            self.api_base_url = base;
        }

        if let Ok(secrets) = std::env::var("GEMINI_OCR_SECRETS") {
            self.secrets_path = Some(PathBuf::from(secrets));
        }
    }

    /// Directory for debug logs
    pub fn log_directory(&self) -> PathBuf {
        self.log_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Secrets files to consult, in priority order
    pub fn secrets_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(ref path) = self.secrets_path {
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from("secrets.toml"));
        if let Some(dirs) = project_dirs() {
            candidates.push(dirs.config_dir().join("secrets.toml"));
        }
        candidates
    }

    /// Resolve the API key from the environment first, then the secrets files
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key_from(std::env::var(API_KEY_VAR).ok(), &self.secrets_candidates())
    }
}

pub fn resolve_api_key_from(env_value: Option<String>, secrets_files: &[PathBuf]) -> Result<String> {
    if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }

    for path in secrets_files.iter().filter(|p| p.exists()) {
        let contents = std::fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&contents)
            .map_err(|e| OcrError::Config(format!("{}: {}", path.display(), e)))?;

        if let Some(key) = table.get(API_KEY_VAR).and_then(|v| v.as_str()) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }
    }

    Err(OcrError::Config(format!(
        "Gemini API key is not set. Export {} or add `{} = \"YOUR_API_KEY\"` to secrets.toml",
        API_KEY_VAR, API_KEY_VAR
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_env_value_wins() {
        let temp_dir = TempDir::new().unwrap();
        let secrets = temp_dir.path().join("secrets.toml");
        std::fs::write(&secrets, "GOOGLE_API_KEY = \"from-file\"\n").unwrap();

        let key = resolve_api_key_from(Some("from-env".to_string()), &[secrets]).unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_secrets_file_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        let secrets = temp_dir.path().join("secrets.toml");
        std::fs::write(&secrets, "OTHER = 1\nGOOGLE_API_KEY = \"from-file\"\n").unwrap();

        let key = resolve_api_key_from(Some("  ".to_string()), &[missing, secrets]).unwrap();
        assert_eq!(key, "from-file");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let secrets = temp_dir.path().join("secrets.toml");
        std::fs::write(&secrets, "SOMETHING_ELSE = \"x\"\n").unwrap();

        let err = resolve_api_key_from(None, &[secrets]).unwrap_err();
        assert!(matches!(err, OcrError::Config(_)));
    }

    #[test]
    fn test_load_partial_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "default_model = \"pro\"\nrequest_timeout_secs = 30\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, OcrModel::Pro);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.accepted_extensions, default_accepted_extensions());
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_explicit_secrets_path_comes_first() {
        let config = AppConfig {
            secrets_path: Some(PathBuf::from("/etc/gemini-ocr/secrets.toml")),
            ..AppConfig::default()
        };
        let candidates = config.secrets_candidates();
        assert_eq!(candidates[0], PathBuf::from("/etc/gemini-ocr/secrets.toml"));
        assert_eq!(candidates[1], PathBuf::from("secrets.toml"));
    }
}
