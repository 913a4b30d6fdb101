//! Configuration module for workshop-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct WorkshopConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Which backing store the service runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres(DatabaseConfig),
    Memory,
}

impl WorkshopConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from `common` settings and a variable lookup.
    pub fn from_lookup(
        common: core_config::Config,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let database_url = var("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let backend = var("STORE_BACKEND")
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_else(|| {
                if database_url.is_some() {
                    "postgres".to_string()
                } else {
                    "memory".to_string()
                }
            });

        let store = match backend.as_str() {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres(DatabaseConfig {
                url: database_url.ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "DATABASE_URL is required when STORE_BACKEND=postgres"
                    ))
                })?,
                max_connections: var("DATABASE_MAX_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: var("DATABASE_MIN_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            }),
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Unknown STORE_BACKEND '{}', expected 'postgres' or 'memory'",
                    other
                )))
            }
        };

        Ok(Self {
            common,
            service_name: var("SERVICE_NAME").unwrap_or_else(|| "workshop-service".to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            otlp_endpoint: var("OTLP_ENDPOINT").filter(|s| !s.trim().is_empty()),
            store,
        })
    }
}
