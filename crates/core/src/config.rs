//! Process configuration read from the environment.
//!
//! Every demo binary calls [`AppConfig::from_env`] once at startup and passes
//! the result down explicitly. Tests use [`AppConfig::from_lookup`] with a map
//! instead of touching the real environment.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "HOST";
pub const ENV_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
pub const ENV_EXTENSION_NAME: &str = "WEBSHIM_EXTENSION_NAME";
pub const ENV_AGENT_PATH: &str = "WEBSHIM_AGENT_PATH";
pub const ENV_TIME_UNIT_MS: &str = "WEBSHIM_TIME_UNIT_MS";
pub const ENV_LOG_FORMAT: &str = "WEBSHIM_LOG_FORMAT";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_EXTENSION_NAME: &str = "background-task-extension";
const DEFAULT_AGENT_PATH: &str = "/events";
const DEFAULT_TIME_UNIT_MS: u64 = 1_000;

/// Log output format.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line (what CloudWatch ingests best).
    #[default]
    Json,
    /// Human-readable multi-line output for local runs.
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid(
                ENV_LOG_FORMAT,
                value,
                "expected one of: json, pretty",
            )),
        }
    }
}

/// Configuration shared by all demo processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    /// `host:port` of the Lambda runtime API. `None` outside Lambda.
    pub runtime_api: Option<String>,
    pub extension_name: String,
    /// Path on which agent envelopes are accepted.
    pub agent_path: String,
    /// Length of one "time unit" used by mock tasks and demo streams.
    pub time_unit: Duration,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            runtime_api: None,
            extension_name: DEFAULT_EXTENSION_NAME.to_string(),
            agent_path: DEFAULT_AGENT_PATH.to_string(),
            time_unit: Duration::from_millis(DEFAULT_TIME_UNIT_MS),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid(ENV_PORT, raw.clone(), e.to_string()))?,
            None => DEFAULT_PORT,
        };

        let host_raw = lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = host_raw
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::invalid(ENV_HOST, host_raw.clone(), e.to_string()))?;

        // An empty runtime API is treated as "not running on Lambda".
        let runtime_api = lookup(ENV_RUNTIME_API)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let extension_name = match lookup(ENV_EXTENSION_NAME) {
            Some(v) if v.trim().is_empty() => return Err(ConfigError::Empty(ENV_EXTENSION_NAME)),
            Some(v) => v.trim().to_string(),
            None => DEFAULT_EXTENSION_NAME.to_string(),
        };

        let agent_path = match lookup(ENV_AGENT_PATH) {
            Some(v) => normalize_path(&v)?,
            None => DEFAULT_AGENT_PATH.to_string(),
        };

        let time_unit = match lookup(ENV_TIME_UNIT_MS) {
            Some(raw) => {
                let ms = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::invalid(ENV_TIME_UNIT_MS, raw.clone(), e.to_string()))?;
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_TIME_UNIT_MS),
        };

        let log_format = match lookup(ENV_LOG_FORMAT) {
            Some(raw) => LogFormat::parse(&raw)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            host,
            port,
            runtime_api,
            extension_name,
            agent_path,
            time_unit,
            log_format,
        })
    }

    /// Address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// True when the process runs inside a Lambda execution environment.
    pub fn is_lambda(&self) -> bool {
        self.runtime_api.is_some()
    }
}

fn normalize_path(raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(ENV_AGENT_PATH));
    }
    if trimmed.contains('?') || trimmed.contains(char::is_whitespace) {
        return Err(ConfigError::invalid(
            ENV_AGENT_PATH,
            raw,
            "must be a bare path without query or whitespace",
        ));
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ConfigResult<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.listen_addr().to_string(), "0.0.0.0:8080");
        assert!(!cfg.is_lambda());
    }

    #[test]
    fn reads_port_runtime_api_and_agent_path() {
        let cfg = load(&[
            ("PORT", "9000"),
            ("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001"),
            ("WEBSHIM_AGENT_PATH", "invoke"),
            ("WEBSHIM_TIME_UNIT_MS", "5"),
            ("WEBSHIM_LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.runtime_api.as_deref(), Some("127.0.0.1:9001"));
        assert_eq!(cfg.agent_path, "/invoke");
        assert_eq!(cfg.time_unit, Duration::from_millis(5));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(cfg.is_lambda());
    }

    #[test]
    fn blank_runtime_api_means_local_mode() {
        let cfg = load(&[("AWS_LAMBDA_RUNTIME_API", "  ")]).unwrap();
        assert!(cfg.runtime_api.is_none());
    }

    #[test]
    fn rejects_unparsable_values() {
        assert!(matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidValue { name: ENV_PORT, .. })
        ));
        assert!(matches!(
            load(&[("WEBSHIM_TIME_UNIT_MS", "-1")]),
            Err(ConfigError::InvalidValue { name: ENV_TIME_UNIT_MS, .. })
        ));
        assert!(matches!(
            load(&[("WEBSHIM_LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidValue { name: ENV_LOG_FORMAT, .. })
        ));
        assert_eq!(
            load(&[("WEBSHIM_EXTENSION_NAME", "")]),
            Err(ConfigError::Empty(ENV_EXTENSION_NAME))
        );
        assert!(load(&[("WEBSHIM_AGENT_PATH", "/events?x=1")]).is_err());
    }
}
