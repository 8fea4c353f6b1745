use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    middleware::{access_log::DEFAULT_MAX_BODY, LogConfig},
    static_files::StaticConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("proxy is enabled but no target is configured")]
    MissingProxyTarget,
    #[error("invalid proxy target {target:?}: {source}")]
    InvalidProxyTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },
    #[error("proxy prefix must start with '/', got {0:?}")]
    InvalidProxyPrefix(String),
    #[error("static files and the reverse proxy cannot both be mounted at '/'")]
    FallbackConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Debug,
    Release,
    Test,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mode: RunMode,
    pub access_log: AccessLogConfig,
    pub cors: ToggleConfig,
    pub hsts: ToggleConfig,
    pub static_files: StaticFilesConfig,
    pub proxy: ProxyConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLogConfig {
    pub enabled: bool,
    /// Successful requests faster than this are not logged. 0 logs everything.
    pub threshold_ms: u64,
    pub ignore_static_media: bool,
    /// Larger request bodies are not captured and the request is not logged.
    pub max_body_bytes: usize,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_ms: 0,
            ignore_static_media: true,
            max_body_bytes: DEFAULT_MAX_BODY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleConfig {
    pub enabled: bool,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub enabled: bool,
    pub url_prefix: String,
    pub file_root: String,
    pub index: bool,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        let defaults = StaticConfig::default();
        Self {
            enabled: false,
            url_prefix: defaults.url_prefix,
            file_root: defaults.file_root.to_string_lossy().into_owned(),
            index: defaults.index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    /// Requests under this prefix are forwarded.
    pub prefix: String,
    pub target: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: "/".to_string(),
            target: None,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| "config/default.yaml".to_string());

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GATEWAY_KIT")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Override with environment variables if present
        if let Ok(host) = std::env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>()?)?;
        }
        if let Ok(metrics_port) = std::env::var("METRICS_PORT") {
            builder = builder.set_override("metrics.port", metrics_port.parse::<u16>()?)?;
        }

        let settings = builder.build()?;
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.enabled {
            self.proxy_target()?;
            if !self.proxy.prefix.starts_with('/') {
                return Err(ConfigError::InvalidProxyPrefix(self.proxy.prefix.clone()));
            }
            if self.static_files.enabled
                && is_root(&self.proxy.prefix)
                && is_root(&self.static_files.url_prefix)
            {
                return Err(ConfigError::FallbackConflict);
            }
        }
        Ok(())
    }

    pub fn proxy_target(&self) -> Result<Url, ConfigError> {
        let target = self
            .proxy
            .target
            .as_deref()
            .ok_or(ConfigError::MissingProxyTarget)?;
        Url::parse(target).map_err(|source| ConfigError::InvalidProxyTarget {
            target: target.to_string(),
            source,
        })
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::default()
            .with_threshold(Duration::from_millis(self.access_log.threshold_ms))
            .with_ignore_static_media(self.access_log.ignore_static_media)
            .with_max_body(self.access_log.max_body_bytes)
    }

    pub fn static_config(&self) -> StaticConfig {
        StaticConfig::default()
            .with_url_prefix(&self.static_files.url_prefix)
            .with_file_root(&self.static_files.file_root)
            .with_index(self.static_files.index)
    }
}

fn is_root(prefix: &str) -> bool {
    prefix.trim_end_matches('/').is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str("{}", config::FileFormat::Yaml))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.mode, RunMode::Debug);
        assert!(config.access_log.ignore_static_media);
        assert_eq!(config.access_log.max_body_bytes, 2 * 1024 * 1024);
        assert!(config.cors.enabled);
        assert!(!config.proxy.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_sections_override_defaults() {
        let yaml = r#"
mode: release
access_log:
  threshold_ms: 250
  ignore_static_media: false
  max_body_bytes: 4096
proxy:
  enabled: true
  prefix: /docs
  target: http://oss.internal:9000/site
"#;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.mode, RunMode::Release);
        let log = config.log_config();
        assert_eq!(log.threshold, Duration::from_millis(250));
        assert!(!log.ignore_static_media);
        assert_eq!(log.max_body, 4096);
        assert_eq!(
            config.proxy_target().unwrap().as_str(),
            "http://oss.internal:9000/site"
        );
    }

    #[test]
    fn proxy_needs_valid_target() {
        let mut config = AppConfig::default();
        config.proxy.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingProxyTarget)));

        config.proxy.target = Some("not a url".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProxyTarget { .. })
        ));

        config.proxy.target = Some("http://localhost:9000".to_string());
        config.proxy.prefix = "docs".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidProxyPrefix(_))));

        config.proxy.prefix = "/".to_string();
        config.static_files.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::FallbackConflict)));
    }
}
