use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::transport::{Credentials, SessionOptions};

pub const DEFAULT_CONFIG_FILE: &str = "veeam.toml";
const ENV_PREFIX: &str = "VEEAM_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    #[default]
    None,
    Slack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub channel: NotificationChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
    /// Upper bound on one webhook delivery.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel: NotificationChannelType::None,
            slack_webhook: None,
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// API base URL, e.g. `https://backup01:9398/api`
    pub url: String,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
    /// Success lookups allowed in flight while checking failed runs.
    pub lookup_concurrency: usize,
    /// Repositories below this free-space percentage raise an alert.
    pub low_space_threshold: f64,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            verify_tls: false,
            timeout_secs: 30,
            lookup_concurrency: 1,
            low_space_threshold: 10.0,
            notifications: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `config_file` (or `veeam.toml`), then `VEEAM_*`
    /// environment variables, then whichever CLI overrides were given.
    pub fn new<T: Serialize>(config_file: Option<&Path>, overrides: Option<&T>) -> Result<Self> {
        let path = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        if config_file.is_some() && !path.exists() {
            bail!("Config file {} does not exist", path.display());
        }

        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::extract(figment, overrides)
    }

    /// Like [`AppConfig::new`] without the environment layer.
    pub fn from_file<T: Serialize>(path: &Path, overrides: Option<&T>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path));
        Self::extract(figment, overrides)
    }

    fn extract<T: Serialize>(mut figment: Figment, overrides: Option<&T>) -> Result<Self> {
        if let Some(args) = overrides {
            figment = figment.merge(Serialized::defaults(args));
        }
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            bail!("No API url configured (set `url` in the config file or VEEAM_URL)");
        }
        if self.username.trim().is_empty() {
            bail!("No username configured (set `username` in the config file or VEEAM_USERNAME)");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            verify_tls: self.verify_tls,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Effective configuration as TOML with secrets blanked out.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.password.is_empty() {
            shown.password = "<redacted>".to_string();
        }
        if shown.notifications.slack_webhook.is_some() {
            shown.notifications.slack_webhook = Some("<redacted>".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}
