//! Outcome notifications.
//!
//! Delivery is fire-and-forget. [`Notifier::notify`] has no error channel:
//! transport failures are logged and dropped so that a broken webhook can
//! never turn a successful update into a failed one.

use crate::config::Settings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const SUCCESS_COLOR: u32 = 3066993;
const FAILURE_COLOR: u32 = 15158332;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    fn color(&self) -> u32 {
        match self {
            Outcome::Success => SUCCESS_COLOR,
            Outcome::Failure => FAILURE_COLOR,
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            Outcome::Success => "✅",
            Outcome::Failure => "❌",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure => f.write_str("failure"),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, outcome: Outcome, message: &str, project: &str);
}

/// Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, outcome: Outcome, _message: &str, project: &str) {
        debug!(%project, %outcome, "No webhook configured, skipping notification");
    }
}

/// Posts a Discord-style embed to a webhook URL.
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// One POST attempt, surfacing transport and status failures.
    pub async fn try_notify(&self, outcome: Outcome, message: &str, project: &str) -> Result<()> {
        let body = payload(outcome, message, project, Utc::now());
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Notification(format!(
                "webhook returned HTTP {}",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, outcome: Outcome, message: &str, project: &str) {
        match self.try_notify(outcome, message, project).await {
            Ok(()) => debug!(%project, %outcome, "Notification delivered"),
            Err(e) => warn!(%project, %outcome, "Notification not delivered: {}", e),
        }
    }
}

/// Webhook notifier if one is configured, otherwise a no-op.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn Notifier>> {
    match &settings.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url.clone())?)),
        None => Ok(Arc::new(NoopNotifier)),
    }
}

pub fn payload(outcome: Outcome, message: &str, project: &str, at: DateTime<Utc>) -> Value {
    json!({
        "embeds": [{
            "title": format!("{} stackward: {}", outcome.emoji(), project),
            "description": message,
            "color": outcome.color(),
            "timestamp": at.to_rfc3339(),
        }]
    })
}
