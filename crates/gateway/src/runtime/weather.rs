//! Weather lookup used to build each outbound message.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use es_domain::config::WeatherConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("weather request failed: {0}")]
    Http(String),
    #[error("weather service returned HTTP {0}")]
    Status(u16),
    #[error("weather response is not JSON: {0}")]
    Decode(String),
    #[error("weather request timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of current conditions for a coordinate. The payload is opaque to
/// the dispatcher; composition decides what it can read from it.
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Value, FetchError>;
}

/// Open-Meteo forecast API, `current_weather=true`.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl WeatherClient for OpenMeteoClient {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Http(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(current_conditions(body))
    }
}

/// The `current_weather` object when present, otherwise the whole body.
pub fn current_conditions(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("current_weather") {
            Some(current) => current,
            None => Value::Object(map),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_current_weather() {
        let body = json!({
            "latitude": 52.5,
            "current_weather": { "temperature": 11.2, "windspeed": 3.4, "time": "2025-01-01T00:00" }
        });
        let out = current_conditions(body);
        assert_eq!(out["temperature"], 11.2);
        assert!(out.get("latitude").is_none());
    }

    #[test]
    fn passes_body_through_without_current_weather() {
        let body = json!({ "error": true, "reason": "bad latitude" });
        assert_eq!(current_conditions(body.clone()), body);
        assert_eq!(current_conditions(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(OpenMeteoClient::new(&WeatherConfig::default()).is_ok());
    }
}
