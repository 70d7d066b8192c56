//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use hexcore_dispatch::PipelineConfig;

use crate::error::AppError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_METRICS_PORT: u16 = 9090;

/// Settings for the API binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Postgres connection string (`DATABASE_URL`).
    pub database_url: String,
    /// Bind address (`HOST`).
    pub host: String,
    /// Bind port (`PORT`).
    pub port: u16,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`).
    pub max_connections: u32,
    /// Optional pipeline YAML file (`HEXCORE_PIPELINE_CONFIG`).
    pub pipeline_path: Option<PathBuf>,
    /// Optional Redis URL (`REDIS_URL`). Used only with the `redis` feature.
    pub redis_url: Option<String>,
    /// Prometheus scrape port on `host` (`METRICS_PORT`).
    pub metrics_port: u16,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => DEFAULT_PORT,
        };
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().map_err(|e| {
                AppError::Config(format!("DATABASE_MAX_CONNECTIONS must be a valid u32: {e}"))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let metrics_port = match lookup("METRICS_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("METRICS_PORT must be a valid u16: {e}")))?,
            None => DEFAULT_METRICS_PORT,
        };

        Ok(Self {
            database_url,
            host,
            port,
            max_connections,
            pipeline_path: lookup("HEXCORE_PIPELINE_CONFIG").map(PathBuf::from),
            redis_url: lookup("REDIS_URL"),
            metrics_port,
        })
    }

    /// The address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }

    /// The address the Prometheus exporter listens on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:METRICS_PORT` is not a socket address.
    pub fn metrics_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.metrics_port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:METRICS_PORT combination: {e}")))
    }

    /// Loads the pipeline file, or the defaults when none is configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Pipeline` if the file cannot be read or parsed.
    pub fn pipeline(&self) -> Result<PipelineConfig, AppError> {
        match &self.pipeline_path {
            Some(path) => Ok(PipelineConfig::load(path)?),
            None => Ok(PipelineConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Act
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/hexcore")]).unwrap();

        // Assert
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_connections, 10);
        assert!(config.pipeline_path.is_none());
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
        assert_eq!(config.metrics_addr().unwrap().port(), 9090);
        assert_eq!(config.pipeline().unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        // Act
        let result = config_from(&[("PORT", "8080")]);

        // Assert
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_port_is_a_config_error() {
        // Act
        let result = config_from(&[("DATABASE_URL", "postgres://x"), ("PORT", "http")]);

        // Assert
        match result {
            Err(AppError::Config(message)) => assert!(message.starts_with("PORT")),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_metrics_port_is_configurable() {
        let config = config_from(&[("DATABASE_URL", "postgres://x"), ("METRICS_PORT", "9464")]).unwrap();

        assert_eq!(config.metrics_addr().unwrap().to_string(), "0.0.0.0:9464");
        assert!(matches!(
            config_from(&[("DATABASE_URL", "postgres://x"), ("METRICS_PORT", "-1")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_missing_pipeline_file_is_reported() {
        // Arrange
        let config = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("HEXCORE_PIPELINE_CONFIG", "/nonexistent/pipeline.yaml"),
        ])
        .unwrap();

        // Act
        let result = config.pipeline();

        // Assert
        assert!(matches!(result, Err(AppError::Pipeline(_))));
    }
}
