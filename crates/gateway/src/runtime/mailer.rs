//! Message composition and delivery sinks.
//!
//! Composition never fails: a payload it cannot read produces a degraded
//! message carrying the raw JSON, so an odd upstream response still gets
//! delivered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use es_domain::config::{MailConfig, SinkKind};

const SIGNATURE: &str = "Regards,\nEmail Scheduler";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Composition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

fn render(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "n/a".into(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Build the message for `recipient` from a weather payload.
pub fn compose(recipient: &str, payload: &Value) -> OutboundMessage {
    let temperature = payload
        .as_object()
        .and_then(|o| o.get("temperature"))
        .filter(|t| !t.is_null());

    match temperature {
        Some(t) => {
            let t = render(Some(t));
            let body = format!(
                "Hello,\n\n\
                 Current weather at your location:\n\
                 - Temperature: {t} °C\n\
                 - Wind speed: {wind} m/s\n\
                 - Observed at: {time}\n\n\
                 {SIGNATURE}",
                wind = render(payload.get("windspeed")),
                time = render(payload.get("time")),
            );
            OutboundMessage {
                to: recipient.to_string(),
                subject: format!("Weather update — {t}°C"),
                body,
            }
        }
        None => OutboundMessage {
            to: recipient.to_string(),
            subject: "Weather update".into(),
            body: format!(
                "Hello,\n\nCould not fetch detailed weather.\nRaw: {payload}\n\n{SIGNATURE}"
            ),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Http(String),
    #[error("delivery endpoint returned HTTP {0}")]
    Status(u16),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Sink(String),
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Prints a framed mock email to stdout.
pub struct ConsoleSink {
    from: String,
}

impl ConsoleSink {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl DeliverySink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let rule = "=".repeat(60);
        println!(
            "{rule}\nFrom: {}\nTo: {}\nSubject: {}\n\n{}\n{rule}",
            self.from, message.to, message.subject, message.body
        );
        tracing::debug!(to = %message.to, subject = %message.subject, "mock email printed");
        Ok(())
    }
}

/// Writes the message to the log only.
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "email delivered (log sink)"
        );
        Ok(())
    }
}

/// POSTs `{from, to, subject, body}` as JSON to a mail relay.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    from: String,
    timeout: Duration,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, from: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            from: from.into(),
            timeout,
        })
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "body": message.body,
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Http(e.to_string())
                }
            })?;
        if resp.status().is_success() {
            tracing::debug!(url = %self.url, status = %resp.status(), "webhook delivered");
            Ok(())
        } else {
            Err(DeliveryError::Status(resp.status().as_u16()))
        }
    }
}

/// Pick the sink named by `[mail]`.
pub fn sink_from_config(config: &MailConfig) -> Result<Arc<dyn DeliverySink>, DeliveryError> {
    match config.sink {
        SinkKind::Console => Ok(Arc::new(ConsoleSink::new(config.from.clone()))),
        SinkKind::Log => Ok(Arc::new(LogSink)),
        SinkKind::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| DeliveryError::Sink("webhook sink requires mail.webhook_url".into()))?;
            Ok(Arc::new(WebhookSink::new(
                url,
                config.from.clone(),
                Duration::from_millis(config.timeout_ms),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compose_recognized_payload() {
        let payload = json!({ "temperature": 12.5, "windspeed": 3.1, "time": "2025-01-01T00:00" });
        let msg = compose("a@example.com", &payload);
        assert_eq!(msg.to, "a@example.com");
        assert_eq!(msg.subject, "Weather update — 12.5°C");
        assert!(msg.body.contains("Temperature: 12.5 °C"));
        assert!(msg.body.contains("Wind speed: 3.1 m/s"));
        assert!(msg.body.contains("Observed at: 2025-01-01T00:00"));
        assert!(msg.body.ends_with("Email Scheduler"));
    }

    #[test]
    fn compose_missing_optional_fields_render_na() {
        let msg = compose("a@example.com", &json!({ "temperature": -3 }));
        assert_eq!(msg.subject, "Weather update — -3°C");
        assert!(msg.body.contains("Wind speed: n/a m/s"));
        assert!(msg.body.contains("Observed at: n/a"));
    }

    #[test]
    fn compose_falls_back_on_unexpected_shape() {
        for payload in [json!({ "error": true }), json!(null), json!("oops"), json!({ "temperature": null })] {
            let msg = compose("a@example.com", &payload);
            assert_eq!(msg.subject, "Weather update");
            assert!(msg.body.contains("Could not fetch detailed weather"));
            assert!(msg.body.contains(&payload.to_string()));
        }
    }

    #[test]
    fn sink_selection() {
        let mut cfg = MailConfig::default();
        assert_eq!(sink_from_config(&cfg).unwrap().name(), "console");

        cfg.sink = SinkKind::Log;
        assert_eq!(sink_from_config(&cfg).unwrap().name(), "log");

        cfg.sink = SinkKind::Webhook;
        assert!(sink_from_config(&cfg).is_err());

        cfg.webhook_url = Some("http://127.0.0.1:9/mail".into());
        assert_eq!(sink_from_config(&cfg).unwrap().name(), "webhook");
    }

    #[tokio::test]
    async fn log_sink_always_succeeds() {
        let msg = compose("a@example.com", &json!({}));
        assert!(LogSink.deliver(&msg).await.is_ok());
    }
}
