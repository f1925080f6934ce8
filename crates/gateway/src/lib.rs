//! email-scheduler gateway: entry store, poll loop, HTTP API and CLI.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod import;
pub mod runtime;
pub mod state;
