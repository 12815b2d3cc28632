use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use slicer_core::config::{self as core_config, SlicerConfig};

/// Server configuration loaded from environment variables.
///
/// Read once at start-up; there is no hot reload.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds. Must cover a fetch plus a full slice.
    pub request_timeout_secs: u64,
    /// Engine, workspace, and limit settings handed to the job coordinator.
    pub slicer: SlicerConfig,
}

/// A configuration variable held a value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} has an invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `8080`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`  | `900`                   |
    /// | `PRUSA_SLICER_BIN`      | `prusa-slicer`          |
    /// | `SLICER_WORKDIR`        | `/tmp/slicer-workdir`   |
    /// | `PROFILES_DIR`          | `/profiles`             |
    /// | `MAX_FILE_SIZE_MB`      | `100`                   |
    /// | `FETCH_TIMEOUT_SECS`    | `120`                   |
    /// | `ESTIMATE_TIMEOUT_SECS` | `300`                   |
    /// | `SLICE_TIMEOUT_SECS`    | `600`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_var(&lookup, "PORT", 8080)?;

        let raw_origins = lookup("CORS_ORIGINS").unwrap_or_else(|| "http://localhost:3000".into());
        let cors_origins = raw_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|e| ConfigError {
                    var: "CORS_ORIGINS",
                    value: origin.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request_timeout_secs: u64 = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 900)?;

        let max_file_size_mb: u64 =
            parse_var(&lookup, "MAX_FILE_SIZE_MB", core_config::DEFAULT_MAX_FILE_SIZE_MB)?;
        let slicer = SlicerConfig {
            binary: lookup("PRUSA_SLICER_BIN").unwrap_or_else(|| core_config::DEFAULT_BINARY.into()),
            workspace_root: lookup("SLICER_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(core_config::DEFAULT_WORKSPACE_ROOT)),
            profiles_dir: lookup("PROFILES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(core_config::DEFAULT_PROFILES_DIR)),
            max_input_bytes: SlicerConfig::megabytes(max_file_size_mb),
            fetch_timeout: secs_var(&lookup, "FETCH_TIMEOUT_SECS", core_config::DEFAULT_FETCH_TIMEOUT)?,
            estimate_timeout: secs_var(
                &lookup,
                "ESTIMATE_TIMEOUT_SECS",
                core_config::DEFAULT_ESTIMATE_TIMEOUT,
            )?,
            slice_timeout: secs_var(&lookup, "SLICE_TIMEOUT_SECS", core_config::DEFAULT_SLICE_TIMEOUT)?,
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            slicer,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}

fn secs_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_var(lookup, var, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).expect("defaults load");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout_secs, 900);
        assert_eq!(config.slicer.binary, "prusa-slicer");
        assert_eq!(config.slicer.max_input_bytes, 100 * 1024 * 1024);
        assert_eq!(config.slicer.estimate_timeout, Duration::from_secs(300));
        assert_eq!(config.slicer.slice_timeout, Duration::from_secs(600));
        assert_eq!(config.cors_origins.len(), 1);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("PORT", "9000"),
            ("PRUSA_SLICER_BIN", "/opt/prusa/bin/prusa-slicer"),
            ("SLICER_WORKDIR", "/var/slicer"),
            ("PROFILES_DIR", "/etc/profiles"),
            ("MAX_FILE_SIZE_MB", "5"),
            ("SLICE_TIMEOUT_SECS", "60"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
        ])
        .expect("overrides load");
        assert_eq!(config.port, 9000);
        assert_eq!(config.slicer.binary, "/opt/prusa/bin/prusa-slicer");
        assert_eq!(config.slicer.workspace_root, PathBuf::from("/var/slicer"));
        assert_eq!(config.slicer.profiles_dir, PathBuf::from("/etc/profiles"));
        assert_eq!(config.slicer.max_input_bytes, 5 * 1024 * 1024);
        assert_eq!(config.slicer.slice_timeout, Duration::from_secs(60));
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let err = load(&[("MAX_FILE_SIZE_MB", "lots")]).expect_err("must fail");
        assert_eq!(err.var, "MAX_FILE_SIZE_MB");
        assert_eq!(err.value, "lots");
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let err = load(&[("CORS_ORIGINS", "http://ok.test,bad\norigin")]).expect_err("must fail");
        assert_eq!(err.var, "CORS_ORIGINS");
    }
}
