//! Shared types for the email scheduler: configuration model and the
//! common error type.

pub mod config;
pub mod error;

pub use error::{Error, Result};
