use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fleetmend_domain::{Alert, NotificationChannelConfig, ProblemKind, Severity};
use fleetmend_ports::AlertPort;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans an alert out to every configured channel. When a history store is
/// attached it records the alert first and answers `last_raised` from it;
/// otherwise throttling state lives in memory for the life of the process.
#[derive(Clone)]
pub struct NotificationService {
    channels: Arc<RwLock<Vec<NotificationChannelConfig>>>,
    history: Option<Arc<dyn AlertPort>>,
    last_raised: Arc<Mutex<HashMap<(String, String), DateTime<Utc>>>>,
    http: reqwest::Client,
}

impl NotificationService {
    pub fn new(channels: Vec<NotificationChannelConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            channels: Arc::new(RwLock::new(channels)),
            history: None,
            last_raised: Arc::new(Mutex::new(HashMap::new())),
            http,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn AlertPort>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn channels(&self) -> Vec<NotificationChannelConfig> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn configure_channel(&self, channel: NotificationChannelConfig) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }

    fn remember(&self, alert: &Alert) {
        let key = (alert.entity_key.clone(), alert.kind.as_str().to_string());
        let mut seen = self
            .last_raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = seen.entry(key).or_insert(alert.raised_at);
        if alert.raised_at > *entry {
            *entry = alert.raised_at;
        }
    }

    fn remembered(&self, entity_key: &str, kind: &ProblemKind) -> Option<DateTime<Utc>> {
        self.last_raised
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(entity_key.to_string(), kind.as_str().to_string()))
            .copied()
    }

    async fn send(&self, channel: &NotificationChannelConfig, alert: &Alert) -> Result<()> {
        match channel {
            NotificationChannelConfig::Log => {
                log_alert(alert);
                Ok(())
            }
            NotificationChannelConfig::Ntfy { url, topic } => {
                self.send_ntfy(url, topic, alert).await
            }
        }
    }

    async fn send_ntfy(&self, url: &str, topic: &str, alert: &Alert) -> Result<()> {
        let endpoint = format!("{}/{}", url.trim_end_matches('/'), topic);
        let (priority, tags) = match alert.severity {
            Severity::Critical => ("urgent", "rotating_light"),
            Severity::Warning => ("default", "warning"),
        };
        self.http
            .post(&endpoint)
            .header("Title", alert.title())
            .header("Priority", priority)
            .header("Tags", tags)
            .body(format!("{}\n{}", alert.entity_key, alert.message))
            .send()
            .await
            .with_context(|| format!("ntfy request to {endpoint} failed"))?
            .error_for_status()
            .with_context(|| format!("ntfy rejected alert for {}", alert.entity_key))?;
        Ok(())
    }
}

fn log_alert(alert: &Alert) {
    match alert.severity {
        Severity::Critical => tracing::error!(
            entity = %alert.entity_key,
            domain = alert.source.as_str(),
            kind = %alert.kind,
            "{}",
            alert.message
        ),
        Severity::Warning => tracing::warn!(
            entity = %alert.entity_key,
            domain = alert.source.as_str(),
            kind = %alert.kind,
            "{}",
            alert.message
        ),
    }
}

#[async_trait]
impl AlertPort for NotificationService {
    /// Channel failures are logged and do not fail the alert.
    async fn raise(&self, alert: Alert) -> Result<()> {
        if let Some(history) = &self.history {
            if let Err(e) = history.raise(alert.clone()).await {
                tracing::error!("Failed to record alert history: {}", e);
            }
        }
        self.remember(&alert);

        for channel in self.channels() {
            if let Err(e) = self.send(&channel, &alert).await {
                tracing::error!("Failed to deliver alert: {:#}", e);
            }
        }
        Ok(())
    }

    async fn last_raised(
        &self,
        entity_key: &str,
        kind: &ProblemKind,
    ) -> Result<Option<DateTime<Utc>>> {
        let remembered = self.remembered(entity_key, kind);
        let Some(history) = &self.history else {
            return Ok(remembered);
        };
        match history.last_raised(entity_key, kind).await {
            Ok(stored) => Ok(stored.max(remembered)),
            Err(e) => {
                tracing::warn!("Alert history unavailable, using in-memory state: {}", e);
                Ok(remembered)
            }
        }
    }
}
