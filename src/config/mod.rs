mod dotenv;

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BIND: &str = "127.0.0.1:8790";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EXPORTS_DIR: &str = "var/exports";
const SETTINGS_REL_PATH: &str = "config/reverse-ai.settings.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: Url,
    pub request_timeout: Option<Duration>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: String::from(DEFAULT_MODEL),
            endpoint: default_endpoint(),
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub provider: ProviderSettings,
    pub exports_dir: PathBuf,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read settings '{path}': {message}")]
    ReadFile { path: String, message: String },
    #[error("failed to parse settings TOML '{path}': {message}")]
    ParseToml { path: String, message: String },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub exports: ExportsSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ProviderSection {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ExportsSection {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub env: HashMap<String, String>,
    pub dotenv: HashMap<String, String>,
    pub file: SettingsFile,
}

impl ConfigSources {
    fn lookup(&self, key: &str) -> Option<String> {
        self.env
            .get(key)
            .or_else(|| self.dotenv.get(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

pub fn default_app_root() -> PathBuf {
    std::env::var("REVERSE_AI_APP_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn resolve_app_config(app_root: &Path) -> Result<AppConfig, ConfigError> {
    let sources = ConfigSources {
        env: std::env::vars().collect(),
        dotenv: dotenv::load(app_root.join(".env").as_path())?,
        file: load_settings_file(app_root.join(SETTINGS_REL_PATH).as_path())?,
    };
    select_app_config(&sources, app_root)
}

pub fn select_app_config(sources: &ConfigSources, app_root: &Path) -> Result<AppConfig, ConfigError> {
    let bind_raw = sources
        .lookup("REVERSE_AI_BIND")
        .or_else(|| sources.file.server.bind.clone())
        .unwrap_or_else(|| String::from(DEFAULT_BIND));
    let bind = bind_raw
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidValue {
            key: "REVERSE_AI_BIND",
            message: format!("'{bind_raw}': {e}"),
        })?;

    let api_key = sources
        .lookup("GEMINI_API_KEY")
        .or_else(|| sources.lookup("API_KEY"));
    let model = sources
        .lookup("REVERSE_AI_MODEL")
        .or_else(|| sources.file.provider.model.clone())
        .unwrap_or_else(|| String::from(DEFAULT_MODEL));
    let endpoint_raw = sources
        .lookup("REVERSE_AI_ENDPOINT")
        .or_else(|| sources.file.provider.endpoint.clone())
        .unwrap_or_else(|| String::from(DEFAULT_ENDPOINT));
    let endpoint = Url::parse(endpoint_raw.as_str()).map_err(|e| ConfigError::InvalidValue {
        key: "REVERSE_AI_ENDPOINT",
        message: format!("'{endpoint_raw}': {e}"),
    })?;

    let timeout_secs = match sources.lookup("REVERSE_AI_TIMEOUT_SECS") {
        Some(raw) => Some(raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
            key: "REVERSE_AI_TIMEOUT_SECS",
            message: format!("'{raw}': {e}"),
        })?),
        None => sources.file.provider.timeout_secs,
    };
    if timeout_secs == Some(0) {
        return Err(ConfigError::InvalidValue {
            key: "REVERSE_AI_TIMEOUT_SECS",
            message: String::from("must be a positive number of seconds"),
        });
    }

    let exports_raw = sources
        .lookup("REVERSE_AI_EXPORTS_DIR")
        .or_else(|| sources.file.exports.dir.clone())
        .unwrap_or_else(|| String::from(DEFAULT_EXPORTS_DIR));
    let exports_candidate = PathBuf::from(exports_raw);
    let exports_dir = if exports_candidate.is_absolute() {
        exports_candidate
    } else {
        app_root.join(exports_candidate)
    };

    Ok(AppConfig {
        bind,
        provider: ProviderSettings {
            api_key,
            model,
            endpoint,
            request_timeout: timeout_secs.map(Duration::from_secs),
        },
        exports_dir,
    })
}

pub fn load_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    if !path.is_file() {
        return Ok(SettingsFile::default());
    }
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    toml::from_str::<SettingsFile>(raw.as_str()).map_err(|e| ConfigError::ParseToml {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("default endpoint should be a valid URL")
}
