//! `webshim-core`: configuration and errors shared by every demo process.
//!
//! Nothing here performs IO beyond reading the process environment.

pub mod config;
pub mod error;

pub use config::{AppConfig, LogFormat};
pub use error::{ConfigError, ConfigResult};
