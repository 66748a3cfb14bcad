use admission::{Quota, QuotaPolicy, RouteClass};
use recognition::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level (an `EnvFilter` directive)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Selector path history file
    #[serde(default = "default_path_db_file")]
    pub path_db_file: PathBuf,

    /// Directory for the recognition event logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Quota for every route without its own override
    #[serde(default = "default_quota")]
    pub default_quota: Quota,

    #[serde(default = "default_captcha_quota")]
    pub captcha_quota: Quota,

    #[serde(default = "default_css_path_quota")]
    pub css_path_quota: Quota,

    /// Admission buckets tracked before expired ones are swept
    #[serde(default = "default_max_tracked_clients")]
    pub max_tracked_clients: usize,

    /// Identify clients by the first `X-Forwarded-For` hop (only behind a proxy)
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Upper bound on a single classification or gap match
    #[serde(default = "default_recognition_timeout_secs")]
    pub recognition_timeout_secs: u64,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_enabled: default_true(),
            path_db_file: default_path_db_file(),
            log_dir: default_log_dir(),
            default_quota: default_quota(),
            captcha_quota: default_captcha_quota(),
            css_path_quota: default_css_path_quota(),
            max_tracked_clients: default_max_tracked_clients(),
            trust_forwarded_for: false,
            recognition_timeout_secs: default_recognition_timeout_secs(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and config files
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("server").required(false))
            // Override with environment variables
            .add_source(config::Environment::with_prefix("CAPTCHA_SERVER").separator("__"));

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_secs(self.recognition_timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }

    /// Per-route quotas derived from the three configured quotas.
    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy::new(self.default_quota)
            .with_override(RouteClass::TextCaptcha, self.captcha_quota)
            .with_override(RouteClass::PathLookup, self.css_path_quota)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_path_db_file() -> PathBuf {
    PathBuf::from("path_db.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_quota() -> Quota {
    Quota::per_hour(100)
}

fn default_captcha_quota() -> Quota {
    Quota::per_minute(30)
}

fn default_css_path_quota() -> Quota {
    Quota::per_minute(60)
}

fn default_max_tracked_clients() -> usize {
    10_000
}

fn default_recognition_timeout_secs() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_body_size_mb, 10);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.path_db_file, PathBuf::from("path_db.json"));
        assert!(cfg.enable_cors);
        assert!(cfg.metrics_enabled);
        assert!(!cfg.trust_forwarded_for);
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 7000);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn test_quota_policy_overrides() {
        let policy = ServerConfig::default().quota_policy();
        assert_eq!(policy.quota_for(RouteClass::TextCaptcha), Quota::per_minute(30));
        assert_eq!(policy.quota_for(RouteClass::PathLookup), Quota::per_minute(60));
        assert_eq!(policy.quota_for(RouteClass::Ocr), Quota::per_hour(100));
        assert_eq!(policy.quota_for(RouteClass::Status), Quota::per_hour(100));
    }

    #[test]
    fn test_deserialize_from_json() {
        let cfg: ServerConfig = serde_json::from_value(serde_json::json!({
            "port": 7100,
            "captcha_quota": "5 per second",
            "log_format": "pretty",
            "classifier": { "command": ["ocr-cli", "--stdin"] }
        }))
        .unwrap();
        assert_eq!(cfg.port, 7100);
        assert_eq!(cfg.captcha_quota, Quota::new(5, Duration::from_secs(1)));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.classifier.command, vec!["ocr-cli", "--stdin"]);
        assert_eq!(cfg.default_quota, Quota::per_hour(100));
    }

    #[test]
    fn test_bad_quota_is_rejected() {
        let parsed: Result<ServerConfig, _> =
            serde_json::from_value(serde_json::json!({ "default_quota": "lots per hour" }));
        assert!(parsed.is_err());
    }
}
