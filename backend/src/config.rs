use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const MODEL_FILE_NAME: &str = "pneumonia_model.onnx";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub inference_timeout: Duration,
    pub max_upload_bytes: usize,
    /// When false, processing failures reach the client as a fixed message
    /// and the underlying error text is only logged.
    pub expose_error_details: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: default_model_path(),
            inference_timeout: Duration::from_secs(DEFAULT_INFERENCE_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            expose_error_details: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_or("PORT", &lookup, defaults.port)?;
        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);
        let timeout_secs = parse_or(
            "INFERENCE_TIMEOUT_SECS",
            &lookup,
            DEFAULT_INFERENCE_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "INFERENCE_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", &lookup, defaults.max_upload_bytes)?;
        let expose_error_details = match lookup("EXPOSE_ERROR_DETAILS") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                key: "EXPOSE_ERROR_DETAILS",
                value: raw,
            })?,
            None => defaults.expose_error_details,
        };

        Ok(Self {
            host,
            port,
            model_path,
            inference_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes,
            expose_error_details,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The model artifact ships next to the executable.
fn default_model_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(MODEL_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(MODEL_FILE_NAME))
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_listen_on_all_interfaces_port_5000() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.inference_timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.expose_error_details);
        assert!(config.model_path.ends_with(MODEL_FILE_NAME));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("MODEL_PATH", "/models/xray.onnx"),
            ("INFERENCE_TIMEOUT_SECS", "5"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("EXPOSE_ERROR_DETAILS", "off"),
        ])
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8081");
        assert_eq!(config.model_path, PathBuf::from("/models/xray.onnx"));
        assert_eq!(config.inference_timeout, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, 1024);
        assert!(!config.expose_error_details);
    }

    #[test]
    fn rejects_unparseable_values() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = config_from(&[("EXPOSE_ERROR_DETAILS", "maybe")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "EXPOSE_ERROR_DETAILS",
                ..
            }
        ));

        let err = config_from(&[("INFERENCE_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "INFERENCE_TIMEOUT_SECS",
                ..
            }
        ));
    }
}
