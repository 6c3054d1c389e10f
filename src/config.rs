//! Server configuration: CLI overrides, then environment variables, then defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DATASETS: [&str; 2] = ["dataset_procesado.csv", "dataset.csv"];
const MIB: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("invalid bind address '{0}'")]
    InvalidBind(String),
}

/// Values given on the command line. They win over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub datasets: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: SocketAddr,
    /// Candidate dataset files; the first one that exists is loaded.
    pub dataset_paths: Vec<PathBuf>,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub store_capacity: u64,
    pub store_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            dataset_paths: DEFAULT_DATASETS.iter().map(PathBuf::from).collect(),
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 50 * MIB,
            store_capacity: 100,
            store_ttl: Duration::from_secs(86_400),
        }
    }
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let n: T = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { var, value: value.to_string() })?;
    if n == T::default() {
        return Err(ConfigError::Zero(var));
    }
    Ok(n)
}

fn parse_bind(value: &str) -> Result<SocketAddr, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidBind(value.to_string()))
}

impl AppConfig {
    /// Load configuration from the process environment with CLI overrides.
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reading variables through `lookup`.
    pub fn from_lookup<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Bind address: --addr > --port > REPORTS_BIND > PORT
        if let Some(addr) = overrides.bind_address {
            config.bind_address = parse_bind(&addr)?;
        } else if let Some(p) = overrides.port {
            config.bind_address = parse_bind(&format!("0.0.0.0:{}", p))?;
        } else if let Some(addr) = lookup("REPORTS_BIND") {
            config.bind_address = parse_bind(&addr)?;
        } else if let Some(p) = lookup("PORT") {
            let port: u16 = parse_positive("PORT", &p)?;
            config.bind_address = SocketAddr::from(([0, 0, 0, 0], port));
        }

        if !overrides.datasets.is_empty() {
            config.dataset_paths = overrides.datasets;
        } else if let Some(list) = lookup("REPORTS_DATASET") {
            let paths: Vec<PathBuf> = list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
            if !paths.is_empty() {
                config.dataset_paths = paths;
            }
        }

        if let Some(dir) = lookup("REPORTS_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("REPORTS_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("REPORTS_MAX_UPLOAD_MB") {
            let mb: usize = parse_positive("REPORTS_MAX_UPLOAD_MB", &v)?;
            config.max_upload_bytes = mb.saturating_mul(MIB);
        }
        if let Some(v) = lookup("REPORTS_STORE_CAPACITY") {
            config.store_capacity = parse_positive("REPORTS_STORE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("REPORTS_STORE_TTL_SECS") {
            let secs: u64 = parse_positive("REPORTS_STORE_TTL_SECS", &v)?;
            config.store_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = AppConfig::from_lookup(ConfigOverrides::default(), env(&[])).unwrap();
        assert_eq!(c.bind_address.to_string(), "0.0.0.0:5000");
        assert_eq!(c.dataset_paths, vec![PathBuf::from("dataset_procesado.csv"), PathBuf::from("dataset.csv")]);
        assert_eq!(c.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(c.store_capacity, 100);
        assert_eq!(c.store_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn test_env_values() {
        let c = AppConfig::from_lookup(
            ConfigOverrides::default(),
            env(&[
                ("PORT", "8081"),
                ("REPORTS_DATASET", "a.csv, b.csv"),
                ("REPORTS_MAX_UPLOAD_MB", "5"),
                ("REPORTS_STORE_CAPACITY", "3"),
                ("REPORTS_STORE_TTL_SECS", "60"),
            ]),
        )
        .unwrap();
        assert_eq!(c.bind_address.port(), 8081);
        assert_eq!(c.dataset_paths, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert_eq!(c.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(c.store_capacity, 3);
        assert_eq!(c.store_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_cli_overrides_env() {
        let overrides = ConfigOverrides {
            bind_address: Some("127.0.0.1:9000".into()),
            port: Some(1234),
            datasets: vec![PathBuf::from("cli.csv")],
        };
        let c = AppConfig::from_lookup(
            overrides,
            env(&[("REPORTS_BIND", "0.0.0.0:1"), ("REPORTS_DATASET", "env.csv")]),
        )
        .unwrap();
        assert_eq!(c.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(c.dataset_paths, vec![PathBuf::from("cli.csv")]);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = AppConfig::from_lookup(ConfigOverrides::default(), env(&[("REPORTS_MAX_UPLOAD_MB", "lots")]));
        assert_eq!(
            err.unwrap_err(),
            ConfigError::InvalidNumber { var: "REPORTS_MAX_UPLOAD_MB", value: "lots".into() }
        );
        let err = AppConfig::from_lookup(ConfigOverrides::default(), env(&[("REPORTS_STORE_CAPACITY", "0")]));
        assert_eq!(err.unwrap_err(), ConfigError::Zero("REPORTS_STORE_CAPACITY"));
        let err = AppConfig::from_lookup(ConfigOverrides::default(), env(&[("REPORTS_BIND", "nowhere")]));
        assert_eq!(err.unwrap_err(), ConfigError::InvalidBind("nowhere".into()));
    }
}
