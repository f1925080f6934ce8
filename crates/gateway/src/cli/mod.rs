pub mod config;
pub mod import_cmd;

use anyhow::Context;
use clap::{Parser, Subcommand};

/// email-scheduler: dispatches weather emails at their scheduled local time.
#[derive(Debug, Parser)]
#[command(name = "email-scheduler", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server and poll loop (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Validate a spreadsheet of entries and print the report as JSON.
    /// Nothing is stored or sent.
    Import {
        /// Path to an .xlsx, .xls or .ods file.
        path: std::path::PathBuf,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `ES_CONFIG` (or
/// `config.toml` by default). A missing file yields the defaults. Returns
/// the parsed [`Config`](es_domain::config::Config) and the path that was
/// used.
pub fn load_config() -> anyhow::Result<(es_domain::config::Config, String)> {
    let config_path = std::env::var("ES_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let path = std::path::Path::new(&config_path);
    let config = if path.exists() {
        es_domain::config::Config::load(path).with_context(|| format!("loading {config_path}"))?
    } else {
        es_domain::config::Config::default()
    };

    Ok((config, config_path))
}
