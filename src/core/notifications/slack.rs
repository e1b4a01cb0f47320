use super::{Alert, NotificationChannel};
use crate::core::models::format_timestamp;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }

    fn format_message(&self, alert: &Alert) -> serde_json::Value {
        match alert {
            Alert::JobFailed(run) => {
                let ended = run
                    .end_time
                    .as_ref()
                    .map(|ended| format_timestamp(&ended.utc()))
                    .unwrap_or_else(|| "-".to_string());
                json!({
                    "blocks": [
                        {
                            "type": "header",
                            "text": {
                                "type": "plain_text",
                                "text": "Backup Job Failing",
                                "emoji": true
                            }
                        },
                        {
                            "type": "section",
                            "fields": [
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Job:*\n{}", run.job_name)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Result:*\n{}", run.result.as_str())
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Started:*\n`{}`", format_timestamp(&run.created_at()))
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Ended:*\n`{}`", ended)
                                }
                            ]
                        },
                        {
                            "type": "context",
                            "elements": [
                                {
                                    "type": "mrkdwn",
                                    "text": "No successful run since this failure."
                                }
                            ]
                        }
                    ]
                })
            }
            Alert::RepositoryLowSpace {
                name,
                percentage_free,
                threshold,
            } => {
                json!({
                    "blocks": [
                        {
                            "type": "header",
                            "text": {
                                "type": "plain_text",
                                "text": "Repository Low On Space",
                                "emoji": true
                            }
                        },
                        {
                            "type": "section",
                            "fields": [
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Repository:*\n{}", name)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Free:*\n{:.2}% (threshold {:.0}%)", percentage_free, threshold)
                                }
                            ]
                        }
                    ]
                })
            }
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let payload = self.format_message(alert);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
