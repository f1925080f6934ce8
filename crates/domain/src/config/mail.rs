use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound mail
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where composed messages are handed off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Print a framed mock email to stdout.
    #[default]
    Console,
    /// Emit the message through `tracing` only.
    Log,
    /// POST the message as JSON to `webhook_url`.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub sink: SinkKind,
    #[serde(default = "d_from")]
    pub from: String,
    /// Required when `sink = "webhook"`.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            from: d_from(),
            webhook_url: None,
            timeout_ms: d_10000(),
        }
    }
}

fn d_from() -> String {
    "scheduler@localhost".into()
}
fn d_10000() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_kind_parses_snake_case() {
        let cfg: MailConfig = toml::from_str(
            r#"
            sink = "webhook"
            webhook_url = "https://hooks.example.com/mail"
        "#,
        )
        .unwrap();
        assert_eq!(cfg.sink, SinkKind::Webhook);
        assert_eq!(cfg.webhook_url.as_deref(), Some("https://hooks.example.com/mail"));
    }
}
