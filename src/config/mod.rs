use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "clue";
const APP_CONFIG_FILE: &str = "config.json";

pub const ENV_BACKEND: &str = "CLUE_BACKEND";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_OLLAMA_URL: &str = "OLLAMA_URL";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";

pub const DEFAULT_BACKEND: &str = "gemini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3-vl:8b";
pub const DEFAULT_HOTKEY: &str = "Super+Shift+F";
pub const DEFAULT_PROMPT: &str = "Analyze this screenshot and help me understand what I'm looking at.
If it appears to be a problem or question, provide a clear, helpful answer.
If it's code, explain what it does or identify any issues.
Be concise but thorough.";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_ERROR_DISMISS_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variable} is not set; it is required for the {backend} backend")]
    MissingApiKey {
        variable: &'static str,
        backend: &'static str,
    },
    #[error("unknown backend '{value}'; use 'gemini' or 'ollama'")]
    UnknownBackend { value: String },
    #[error("request_timeout_secs must be greater than zero")]
    InvalidRequestTimeout,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub hotkey: String,
    pub prompt: String,
    pub request_timeout_secs: u64,
    pub error_dismiss_secs: u64,
    pub probe_local_backend: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hotkey: DEFAULT_HOTKEY.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            error_dismiss_secs: DEFAULT_ERROR_DISMISS_SECS,
            probe_local_backend: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendVariant {
    Cloud,
    Local,
}

impl BackendVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendVariant::Cloud => "gemini",
            BackendVariant::Local => "ollama",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "cloud" => Some(BackendVariant::Cloud),
            "ollama" | "local" => Some(BackendVariant::Local),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendVariant::Cloud => "Gemini (Cloud)",
            BackendVariant::Local => "Ollama (Local)",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CloudConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEndpoint {
    Cloud(CloudConfig),
    Local(LocalConfig),
}

/// Backend selection resolved once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub endpoint: BackendEndpoint,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn variant(&self) -> BackendVariant {
        match self.endpoint {
            BackendEndpoint::Cloud(_) => BackendVariant::Cloud,
            BackendEndpoint::Local(_) => BackendVariant::Local,
        }
    }

    pub fn model(&self) -> &str {
        match &self.endpoint {
            BackendEndpoint::Cloud(cloud) => &cloud.model,
            BackendEndpoint::Local(local) => &local.model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub backend: BackendConfig,
    pub hotkey: String,
    pub prompt: String,
    pub error_dismiss_after: Option<Duration>,
    pub probe_local_backend: bool,
}

pub fn resolve_runtime_config() -> ConfigResult<RuntimeConfig> {
    resolve_runtime_config_with(|key| std::env::var(key).ok(), load_app_config())
}

pub fn resolve_runtime_config_with<F>(env: F, file: AppConfig) -> ConfigResult<RuntimeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    let selector = lookup(ENV_BACKEND).unwrap_or_else(|| DEFAULT_BACKEND.to_string());
    let variant = BackendVariant::parse(&selector)
        .ok_or_else(|| ConfigError::UnknownBackend { value: selector })?;

    if file.request_timeout_secs == 0 {
        return Err(ConfigError::InvalidRequestTimeout);
    }

    let endpoint = match variant {
        BackendVariant::Cloud => {
            let api_key = lookup(ENV_GEMINI_API_KEY).ok_or(ConfigError::MissingApiKey {
                variable: ENV_GEMINI_API_KEY,
                backend: variant.as_str(),
            })?;
            BackendEndpoint::Cloud(CloudConfig {
                api_key: api_key.trim().to_string(),
                base_url: normalize_base_url(
                    &lookup(ENV_GEMINI_BASE_URL)
                        .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                ),
                model: lookup(ENV_GEMINI_MODEL)
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            })
        }
        BackendVariant::Local => BackendEndpoint::Local(LocalConfig {
            base_url: normalize_base_url(
                &lookup(ENV_OLLAMA_URL).unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ),
            model: lookup(ENV_OLLAMA_MODEL).unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
        }),
    };

    let prompt = if file.prompt.trim().is_empty() {
        DEFAULT_PROMPT.to_string()
    } else {
        file.prompt
    };

    Ok(RuntimeConfig {
        backend: BackendConfig {
            endpoint,
            request_timeout: Duration::from_secs(file.request_timeout_secs),
        },
        hotkey: file.hotkey,
        prompt,
        error_dismiss_after: (file.error_dismiss_secs > 0)
            .then(|| Duration::from_secs(file.error_dismiss_secs)),
        probe_local_backend: file.probe_local_backend,
    })
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_gemini_and_requires_api_key() {
        let err = resolve_runtime_config_with(env_from(&[]), AppConfig::default())
            .expect_err("missing key must be fatal");

        assert_eq!(
            err,
            ConfigError::MissingApiKey {
                variable: ENV_GEMINI_API_KEY,
                backend: "gemini"
            }
        );
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let err = resolve_runtime_config_with(
            env_from(&[(ENV_GEMINI_API_KEY, "   ")]),
            AppConfig::default(),
        )
        .expect_err("blank key must be fatal");

        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
    }

    #[test]
    fn resolves_cloud_defaults() {
        let config = resolve_runtime_config_with(
            env_from(&[(ENV_GEMINI_API_KEY, "secret")]),
            AppConfig::default(),
        )
        .expect("cloud config should resolve");

        assert_eq!(
            config.backend.endpoint,
            BackendEndpoint::Cloud(CloudConfig {
                api_key: "secret".to_string(),
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: DEFAULT_GEMINI_MODEL.to_string(),
            })
        );
        assert_eq!(config.backend.variant(), BackendVariant::Cloud);
        assert_eq!(config.backend.request_timeout, Duration::from_secs(120));
        assert_eq!(config.hotkey, DEFAULT_HOTKEY);
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.error_dismiss_after, Some(Duration::from_secs(15)));
    }

    #[test]
    fn resolves_local_backend_without_api_key() {
        let config = resolve_runtime_config_with(
            env_from(&[
                (ENV_BACKEND, "Ollama"),
                (ENV_OLLAMA_URL, "http://127.0.0.1:9999/"),
                (ENV_OLLAMA_MODEL, "llava:7b"),
            ]),
            AppConfig::default(),
        )
        .expect("local config should resolve");

        assert_eq!(
            config.backend.endpoint,
            BackendEndpoint::Local(LocalConfig {
                base_url: "http://127.0.0.1:9999".to_string(),
                model: "llava:7b".to_string(),
            })
        );
        assert_eq!(config.backend.model(), "llava:7b");
    }

    #[test]
    fn local_backend_uses_defaults() {
        let config =
            resolve_runtime_config_with(env_from(&[(ENV_BACKEND, "local")]), AppConfig::default())
                .expect("local config should resolve");

        assert_eq!(config.backend.variant(), BackendVariant::Local);
        assert_eq!(config.backend.model(), DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = resolve_runtime_config_with(
            env_from(&[(ENV_BACKEND, "openai")]),
            AppConfig::default(),
        )
        .expect_err("unknown backend must fail");

        assert_eq!(
            err,
            ConfigError::UnknownBackend {
                value: "openai".to_string()
            }
        );
    }

    #[test]
    fn app_config_overrides_timeouts_and_prompt() {
        let file: AppConfig = serde_json::from_str(
            r#"{"hotkey":"Ctrl+Alt+A","prompt":"What is this?","request_timeout_secs":30,"error_dismiss_secs":0}"#,
        )
        .expect("config.json should parse");
        assert!(file.probe_local_backend);

        let config = resolve_runtime_config_with(env_from(&[(ENV_BACKEND, "ollama")]), file)
            .expect("config should resolve");

        assert_eq!(config.hotkey, "Ctrl+Alt+A");
        assert_eq!(config.prompt, "What is this?");
        assert_eq!(config.backend.request_timeout, Duration::from_secs(30));
        assert_eq!(config.error_dismiss_after, None);
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let file = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        let err = resolve_runtime_config_with(env_from(&[(ENV_BACKEND, "ollama")]), file)
            .expect_err("zero timeout must fail");

        assert_eq!(err, ConfigError::InvalidRequestTimeout);
    }

    #[test]
    fn cloud_config_debug_redacts_api_key() {
        let cloud = CloudConfig {
            api_key: "top-secret".to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        };

        assert!(!format!("{cloud:?}").contains("top-secret"));
    }

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "clue",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/config-root/clue/config.json"));
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("clue", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/clue/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("clue", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let config = load_app_config_with(
            Some(Path::new("/tmp/clue-test-nonexistent-config-root")),
            None,
        );

        assert_eq!(config.hotkey, DEFAULT_HOTKEY);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }
}
