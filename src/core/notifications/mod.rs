mod slack;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::{NotificationChannelType, NotificationConfig};
use crate::core::models::{JobRun, RepositoryReport};

/// Conditions worth telling someone about
#[derive(Debug, Clone)]
pub enum Alert {
    JobFailed(JobRun),
    RepositoryLowSpace {
        name: String,
        percentage_free: f64,
        threshold: f64,
    },
}

impl Alert {
    /// Alerts for every repository whose free space is below `threshold` percent.
    pub fn low_space(repos: &[RepositoryReport], threshold: f64) -> Vec<Alert> {
        repos
            .iter()
            .filter_map(|repo| {
                let pct = repo.percentage_free?;
                (pct < threshold).then(|| Alert::RepositoryLowSpace {
                    name: repo.period.name.clone(),
                    percentage_free: pct,
                    threshold,
                })
            })
            .collect()
    }
}

/// Trait for notification channel implementations (Slack, etc.)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Factory function to create a notifier based on config
pub fn create_notifier(config: &NotificationConfig) -> Option<Arc<dyn NotificationChannel>> {
    match &config.channel {
        NotificationChannelType::None => None,
        NotificationChannelType::Slack => {
            let webhook = config.slack_webhook.as_ref()?;
            if webhook.is_empty() {
                return None;
            }
            let timeout = Duration::from_secs(config.timeout_secs);
            match slack::SlackNotifier::new(webhook.clone(), timeout) {
                Ok(notifier) => Some(Arc::new(notifier)),
                Err(e) => {
                    warn!(error = %e, "Could not build Slack client");
                    None
                }
            }
        }
    }
}
