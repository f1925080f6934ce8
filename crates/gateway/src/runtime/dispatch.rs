//! Dispatch executor: fetch, compose, deliver, record, for one entry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::entries::{DeliveryRecord, Entry};
use super::mailer::{compose, DeliveryError, DeliverySink};
use super::weather::{FetchError, WeatherClient};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl DispatchError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Delivery(_) => "deliver",
        }
    }
}

/// Runs the fetch → compose → deliver sequence. Touches no shared state:
/// committing the returned record is the caller's job.
#[derive(Clone)]
pub struct Dispatcher {
    weather: Arc<dyn WeatherClient>,
    sink: Arc<dyn DeliverySink>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        weather: Arc<dyn WeatherClient>,
        sink: Arc<dyn DeliverySink>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            weather,
            sink,
            call_timeout,
        }
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    pub async fn dispatch(&self, entry: &Entry) -> Result<DeliveryRecord, DispatchError> {
        let snapshot = tokio::time::timeout(
            self.call_timeout,
            self.weather.fetch(entry.latitude, entry.longitude),
        )
        .await
        .map_err(|_| FetchError::Timeout(self.call_timeout))??;

        let message = compose(&entry.recipient, &snapshot);

        tokio::time::timeout(self.call_timeout, self.sink.deliver(&message))
            .await
            .map_err(|_| DeliveryError::Timeout(self.call_timeout))??;

        Ok(DeliveryRecord {
            id: Uuid::new_v4(),
            entry_id: entry.id,
            recipient: entry.recipient.clone(),
            sent_at: Utc::now(),
            subject: message.subject,
            external_snapshot: snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mailer::OutboundMessage;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    struct FixedWeather(Result<Value, u16>);

    #[async_trait]
    impl WeatherClient for FixedWeather {
        async fn fetch(&self, _lat: f64, _lon: f64) -> Result<Value, FetchError> {
            self.0.clone().map_err(FetchError::Status)
        }
    }

    struct SlowWeather;

    #[async_trait]
    impl WeatherClient for SlowWeather {
        async fn fetch(&self, _lat: f64, _lon: f64) -> Result<Value, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<OutboundMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl DeliverySink for Outbox {
        fn name(&self) -> &'static str {
            "outbox"
        }
        async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Sink("relay down".into()));
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }

    fn entry() -> Entry {
        Entry {
            id: Uuid::new_v4(),
            recipient: "a@example.com".into(),
            fire_date: "2025-01-01".into(),
            fire_time: "00:00".into(),
            fire_timezone: "UTC".into(),
            latitude: 0.0,
            longitude: 0.0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn success_builds_record() {
        let outbox = Arc::new(Outbox::default());
        let d = Dispatcher::new(
            Arc::new(FixedWeather(Ok(json!({ "temperature": 20.0 })))),
            outbox.clone(),
            Duration::from_secs(1),
        );
        let e = entry();
        let record = d.dispatch(&e).await.unwrap();
        assert_eq!(record.entry_id, e.id);
        assert_eq!(record.recipient, e.recipient);
        assert_eq!(record.subject, "Weather update — 20.0°C");
        assert_eq!(record.external_snapshot, json!({ "temperature": 20.0 }));
        assert_eq!(outbox.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_skips_delivery() {
        let outbox = Arc::new(Outbox::default());
        let d = Dispatcher::new(
            Arc::new(FixedWeather(Err(503))),
            outbox.clone(),
            Duration::from_secs(1),
        );
        let err = d.dispatch(&entry()).await.unwrap_err();
        assert_eq!(err.stage(), "fetch");
        assert!(outbox.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_reported() {
        let d = Dispatcher::new(
            Arc::new(FixedWeather(Ok(json!({})))),
            Arc::new(Outbox {
                fail: true,
                ..Default::default()
            }),
            Duration::from_secs(1),
        );
        let err = d.dispatch(&entry()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Delivery(DeliveryError::Sink(_))));
    }

    #[tokio::test]
    async fn hung_fetch_times_out() {
        let d = Dispatcher::new(
            Arc::new(SlowWeather),
            Arc::new(Outbox::default()),
            Duration::from_millis(50),
        );
        let err = d.dispatch(&entry()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Fetch(FetchError::Timeout(_))));
    }
}
