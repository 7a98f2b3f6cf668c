use std::{env, path::PathBuf, time::Duration};

use crate::error::ConfigError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub keep_uploads: bool,
    pub backends: BackendsConfig,
}

/// Which backends take part in the fallback chains. Decided once at startup.
#[derive(Debug, Clone, Default)]
pub struct BackendsConfig {
    pub cloud: CloudConfig,
    pub local_classifier_url: Option<String>,
    pub local_textgen_url: Option<String>,
    pub timeout: Option<Duration>,
    #[cfg(feature = "tensorflow")]
    pub tensorflow: Option<TensorflowConfig>,
}

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl CloudConfig {
    /// Enabled and holding a credential.
    pub fn active_key(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }
}

#[cfg(feature = "tensorflow")]
#[derive(Debug, Clone)]
pub struct TensorflowConfig {
    pub model_path: String,
    pub labels_path: String,
    pub model_url: Option<String>,
    pub labels_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(&var, "PORT", 5000u16, "must be a valid number between 0 and 65535")?;
        let body_limit_mb = parse_or(&var, "BODY_LIMIT_MB", 16usize, "must be a valid integer")?;
        let keep_uploads = parse_bool(&var, "KEEP_UPLOADS", false)?;

        let timeout = match var("BACKEND_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid {
                    key: "BACKEND_TIMEOUT_SECS",
                    value: raw.clone(),
                    reason: "must be a whole number of seconds",
                }
            })?)),
            None => None,
        };

        let cloud = CloudConfig {
            enabled: parse_bool(&var, "ENABLE_CLOUD", true)?,
            api_key: var("GEMINI_API_KEY"),
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: var("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        #[cfg(feature = "tensorflow")]
        let tensorflow = var("TF_MODEL_PATH").map(|model_path| TensorflowConfig {
            model_path,
            labels_path: var("TF_LABELS_PATH")
                .unwrap_or_else(|| "./model/class_list.txt".to_string()),
            model_url: var("MODEL_URL"),
            labels_url: var("CLASS_LIST_URL"),
        });

        Ok(Config {
            port,
            body_limit_bytes: body_limit_mb * 1024 * 1024,
            static_dir: var("STATIC_DIR").unwrap_or_else(|| ".".into()).into(),
            upload_dir: var("UPLOAD_DIR").unwrap_or_else(|| "uploads".into()).into(),
            keep_uploads,
            backends: BackendsConfig {
                cloud,
                local_classifier_url: var("LOCAL_CLASSIFIER_URL"),
                local_textgen_url: var("LOCAL_TEXTGEN_URL"),
                timeout,
                #[cfg(feature = "tensorflow")]
                tensorflow,
            },
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T, reason: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
            reason,
        }),
        None => Ok(default),
    }
}

fn parse_bool<F>(var: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "must be true or false",
            }),
        },
        None => Ok(default),
    }
}
