//! `email-scheduler config validate|show`.

use anyhow::Context;

use es_domain::config::{Config, ConfigSeverity, SinkKind};

/// One-paragraph description of what `serve` would do with this config.
pub fn summary(config: &Config) -> String {
    let sched = config.scheduler.clamped();
    let scheduler = if sched.enabled {
        format!(
            "every {}s, up to {} dispatch(es) at once, {}ms per call",
            sched.poll_interval_secs, sched.max_concurrent_dispatches, sched.call_timeout_ms
        )
    } else {
        "disabled".to_string()
    };
    let sink = match config.mail.sink {
        SinkKind::Console => "console".to_string(),
        SinkKind::Log => "log".to_string(),
        SinkKind::Webhook => format!(
            "webhook -> {}",
            config.mail.webhook_url.as_deref().unwrap_or("(unset)")
        ),
    };
    let import = config
        .import
        .on_startup
        .as_ref()
        .map_or_else(|| "none".to_string(), |p| p.display().to_string());

    format!(
        "listen:    {}:{}\n\
         scheduler: {scheduler}\n\
         weather:   {}\n\
         delivery:  {sink} (from {})\n\
         import:    {import}",
        config.server.host,
        config.server.port,
        config.weather.base_url,
        config.mail.from,
    )
}

/// Print any issues plus the resolved summary. Returns `false` when at
/// least one issue is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    for issue in &issues {
        println!("{issue}");
    }

    if error_count > 0 {
        println!(
            "\n{error_count} error(s), {} warning(s) in {config_path}",
            issues.len() - error_count,
        );
        return false;
    }

    println!("Config OK ({config_path})\n{}", summary(config));
    true
}

/// Dump the resolved config (with all defaults filled in) as TOML, headed
/// by the summary as comments.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config).context("serializing config")?;
    for line in summary(config).lines() {
        println!("# {line}");
    }
    print!("\n{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_defaults() {
        let s = summary(&Config::default());
        assert!(s.contains("listen:    127.0.0.1:8000"));
        assert!(s.contains("every 30s, up to 8 dispatch(es) at once, 10000ms per call"));
        assert!(s.contains("delivery:  console (from scheduler@localhost)"));
        assert!(s.contains("import:    none"));
    }

    #[test]
    fn summary_reflects_overrides() {
        let config = Config::from_toml(
            "[scheduler]\nenabled = false\n\n\
             [mail]\nsink = \"webhook\"\nwebhook_url = \"https://hooks.example.com/mail\"\n\n\
             [import]\non_startup = \"rows.xlsx\"\n",
        )
        .unwrap();
        let s = summary(&config);
        assert!(s.contains("scheduler: disabled"));
        assert!(s.contains("webhook -> https://hooks.example.com/mail"));
        assert!(s.contains("import:    rows.xlsx"));
    }

    #[test]
    fn summary_clamps_concurrency() {
        let config = Config::from_toml("[scheduler]\nmax_concurrent_dispatches = 500\n").unwrap();
        assert!(summary(&config).contains("up to 64 dispatch(es)"));
    }

    #[test]
    fn validate_fails_on_errors() {
        let config = Config::from_toml("[mail]\nsink = \"webhook\"\n").unwrap();
        assert!(!validate(&config, "test.toml"));
        assert!(validate(&Config::default(), "test.toml"));
    }
}
