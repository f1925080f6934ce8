//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use es_domain::config::{Config, ConfigSeverity};

use crate::runtime::mailer::sink_from_config;
use crate::runtime::weather::OpenMeteoClient;
use crate::state::AppState;

/// Log every config issue and fail on any error-severity one.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Validate config and return a fully-wired [`AppState`] using the
/// production weather client and the configured delivery sink.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    check_config(&config)?;

    // ── Weather client ───────────────────────────────────────────────
    let weather = Arc::new(
        OpenMeteoClient::new(&config.weather).context("building weather client")?,
    );
    tracing::info!(base_url = %config.weather.base_url, "weather client ready");

    // ── Delivery sink ────────────────────────────────────────────────
    let sink = sink_from_config(&config.mail).context("building delivery sink")?;
    tracing::info!(sink = sink.name(), from = %config.mail.from, "delivery sink ready");

    Ok(AppState::new(config, weather, sink))
}

/// Run the startup import (if configured) and start the poll loop.
pub async fn spawn_background_tasks(state: &AppState) -> anyhow::Result<()> {
    // ── Startup import ───────────────────────────────────────────────
    if let Some(path) = state.config.import.on_startup.clone() {
        let store = state.store.clone();
        let summary = tokio::task::spawn_blocking(move || crate::import::import_file(&store, &path))
            .await
            .context("import task panicked")?
            .context("startup import failed")?;
        tracing::info!(
            imported = summary.imported,
            rejected = summary.rejected.len(),
            "startup import complete"
        );
    }

    // ── Poll loop ────────────────────────────────────────────────────
    if state.config.scheduler.enabled {
        state.scheduler.start();
    } else {
        tracing::warn!("scheduler disabled by config; entries will not be dispatched");
    }
    Ok(())
}
