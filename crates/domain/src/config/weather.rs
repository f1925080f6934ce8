use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Weather lookup (Open-Meteo)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Timeout per HTTP request in milliseconds.
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            timeout_ms: d_10000(),
            user_agent: d_user_agent(),
        }
    }
}

fn d_base_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn d_10000() -> u64 {
    10_000
}
fn d_user_agent() -> String {
    format!("email-scheduler/{}", env!("CARGO_PKG_VERSION"))
}
