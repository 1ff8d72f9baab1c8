//! Configuration loader and validator for the order relay and form client.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::image_check::ImageConstraints;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub relay: Relay,
    pub images: Images,
    pub qr: Qr,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Server {
    pub listen_addr: String,
    pub route: String,
}

/// Destination webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Relay {
    pub webhook_url: String,
    pub secret: String,
    pub timeout_seconds: u64,
}

/// Image acceptance rules shared by the form and the checker binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Images {
    pub max_size_mb: u64,
    pub min_long_side_px: u32,
    pub min_short_side_px: u32,
}

/// QR image service used for the two link fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Qr {
    pub base_url: String,
    pub size: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            route: "/api/orders".into(),
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            secret: String::new(),
            timeout_seconds: 60,
        }
    }
}

impl Default for Images {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            min_long_side_px: 900,
            min_short_side_px: 750,
        }
    }
}

impl Default for Qr {
    fn default() -> Self {
        Self {
            base_url: crate::qr::QR_API_BASE.into(),
            size: crate::qr::DEFAULT_QR_SIZE.into(),
        }
    }
}

/// Settings handed to the relay service at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub webhook_url: Option<String>,
    pub secret: Option<String>,
    pub timeout: Duration,
}

impl Config {
    /// Relay settings with blank values collapsed to `None`.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            webhook_url: non_blank(&self.relay.webhook_url),
            secret: non_blank(&self.relay.secret),
            timeout: Duration::from_secs(self.relay.timeout_seconds),
        }
    }

    pub fn image_constraints(&self) -> ImageConstraints {
        ImageConstraints {
            max_bytes: self.images.max_size_mb * 1024 * 1024,
            min_long_side: self.images.min_long_side_px,
            min_short_side: self.images.min_short_side_px,
        }
    }

    /// Largest multipart body the relay accepts: five maximal images plus room for text fields.
    pub fn body_limit(&self) -> usize {
        let images = self.images.max_size_mb.saturating_mul(5 * 1024 * 1024);
        usize::try_from(images.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
    }

    /// Apply `APPSCRIPT_WEBAPP_URL` / `APPSCRIPT_URL` / `APPSCRIPT_SECRET` on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let url = ["APPSCRIPT_WEBAPP_URL", "APPSCRIPT_URL"]
            .iter()
            .filter_map(|key| lookup(key))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());
        if let Some(url) = url {
            self.relay.webhook_url = url;
        }
        if let Some(secret) = lookup("APPSCRIPT_SECRET").map(|v| v.trim().to_string()) {
            if !secret.is_empty() {
                self.relay.secret = secret;
            }
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory,
///   falling back to built-in defaults when that file does not exist.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let cfg = match path {
        Some(path) => parse(&fs::read_to_string(path)?)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                parse(&fs::read_to_string(default_path)?)?
            } else {
                Config::default()
            }
        }
    };
    validate(&cfg)?;
    Ok(cfg)
}

fn parse(content: &str) -> Result<Config, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.listen_addr.trim().is_empty() {
        return Err(ConfigError::Invalid("server.listen_addr must be non-empty"));
    }
    if !cfg.server.route.starts_with('/') {
        return Err(ConfigError::Invalid("server.route must start with '/'"));
    }
    if cfg.relay.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("relay.timeout_seconds must be > 0"));
    }
    // webhook_url may be empty here; requests then fail with a 500

    if cfg.images.max_size_mb == 0 {
        return Err(ConfigError::Invalid("images.max_size_mb must be > 0"));
    }
    if cfg.images.min_long_side_px == 0 || cfg.images.min_short_side_px == 0 {
        return Err(ConfigError::Invalid("images.min_*_side_px must be > 0"));
    }
    if cfg.images.min_short_side_px > cfg.images.min_long_side_px {
        return Err(ConfigError::Invalid(
            "images.min_short_side_px must not exceed images.min_long_side_px",
        ));
    }

    if cfg.qr.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("qr.base_url must be non-empty"));
    }
    if cfg.qr.size.trim().is_empty() {
        return Err(ConfigError::Invalid("qr.size must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML shipped with the crate.
pub fn example() -> &'static str {
    r#"server:
  listen_addr: "0.0.0.0:8080"
  route: "/api/orders"

relay:
  # APPSCRIPT_WEBAPP_URL (or APPSCRIPT_URL) overrides this value
  webhook_url: "https://script.google.com/macros/s/DEPLOYMENT_ID/exec"
  # APPSCRIPT_SECRET overrides this value; leave empty to send no secret
  secret: ""
  timeout_seconds: 60

images:
  max_size_mb: 100
  min_long_side_px: 900
  min_short_side_px: 750

qr:
  base_url: "https://api.qrserver.com/v1/create-qr-code/"
  size: "200x200"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.relay.timeout_seconds, 60);
        assert_eq!(cfg.images.max_size_mb, 100);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("relay:\n  webhook_url: \"https://hook\"\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.server.route, "/api/orders");
        assert_eq!(cfg.relay.timeout_seconds, 60);
        assert_eq!(cfg.qr.size, "200x200");
    }

    #[test]
    fn invalid_timeout() {
        let mut cfg = Config::default();
        cfg.relay.timeout_seconds = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("timeout_seconds")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_route_and_images() {
        let mut cfg = Config::default();
        cfg.server.route = "api/orders".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.images.max_size_mb = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("max_size_mb")),
            _ => panic!("wrong error"),
        }

        let mut cfg = Config::default();
        cfg.images.min_short_side_px = 1000;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.qr.base_url = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_webhook_is_not_a_startup_error() {
        let cfg = Config::default();
        validate(&cfg).unwrap();
        assert_eq!(cfg.relay_config().webhook_url, None);
        assert_eq!(cfg.relay_config().secret, None);
    }

    #[test]
    fn env_overrides_prefer_webapp_url_and_trim() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("APPSCRIPT_WEBAPP_URL", "  https://primary/exec  "),
            ("APPSCRIPT_URL", "https://secondary/exec"),
            ("APPSCRIPT_SECRET", " s3cret "),
        ]);
        let mut cfg = Config::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        let relay = cfg.relay_config();
        assert_eq!(relay.webhook_url.as_deref(), Some("https://primary/exec"));
        assert_eq!(relay.secret.as_deref(), Some("s3cret"));
        assert_eq!(relay.timeout, Duration::from_secs(60));
    }

    #[test]
    fn env_overrides_fall_back_to_appscript_url() {
        let env: HashMap<&str, &str> =
            HashMap::from([("APPSCRIPT_WEBAPP_URL", "   "), ("APPSCRIPT_URL", "https://fallback")]);
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.relay.webhook_url, "https://fallback");
        assert_eq!(cfg.relay.secret, "");
    }

    #[test]
    fn image_constraints_and_body_limit() {
        let cfg = Config::default();
        let c = cfg.image_constraints();
        assert_eq!(c.max_bytes, 100 * 1024 * 1024);
        assert_eq!((c.min_long_side, c.min_short_side), (900, 750));
        assert_eq!(cfg.body_limit(), 501 * 1024 * 1024);
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert!(cfg.relay.webhook_url.starts_with("https://script.google.com"));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let td = tempdir().unwrap();
        let p = td.path().join("absent.yaml");
        assert!(matches!(load(Some(&p)), Err(ConfigError::Io(_))));
    }
}
