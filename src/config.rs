//! Server configuration loaded from environment variables.
//!
//! | Variable              | Meaning                                              |
//! |-----------------------|------------------------------------------------------|
//! | `DFLOW_ENVIRONMENT`   | `development` (default), `staging`, `production`     |
//! | `DFLOW_CORS_ORIGINS`  | Comma-separated origins, replaces the defaults       |
//! | `DFLOW_REDIS_URL`     | REST endpoint of the projection store                |
//! | `DFLOW_REDIS_TOKEN`   | Bearer token for the projection store                |
//! | `DFLOW_STORE`         | `memory` (default) or `sqlite`                       |
//! | `DFLOW_DB_PATH`       | SQLite file, defaults to the platform data directory |

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Preview deployments are served from per-branch subdomains.
pub const PREVIEW_ORIGIN_PATTERN: &str = "https://*.vercel.app";

const DEV_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// CORS origins allowed when none are configured explicitly.
    pub fn default_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = match self {
            Self::Development | Self::Staging => {
                DEV_ORIGINS.iter().map(|o| o.to_string()).collect()
            }
            Self::Production => Vec::new(),
        };
        if *self == Self::Staging {
            origins.push(PREVIEW_ORIGIN_PATTERN.to_string());
        }
        origins
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(anyhow!("Unknown environment: {}", other)),
        }
    }
}

/// Which primary store backs the entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StoreKind {
    #[default]
    Memory,
    Sqlite,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(anyhow!("Unknown store: {}", other)),
        }
    }
}

/// Connection details for the projection store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub environment: Environment,
    pub cors_origins: Vec<String>,
    /// `None` disables the projection.
    pub redis: Option<RedisSettings>,
    pub store: StoreKind,
    pub db_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("DFLOW_ENVIRONMENT")
            .map(|v| v.parse::<Environment>())
            .transpose()?
            .unwrap_or_default();

        let cors_origins = match var("DFLOW_CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => environment.default_origins(),
        };

        let redis = match (var("DFLOW_REDIS_URL"), var("DFLOW_REDIS_TOKEN")) {
            (Some(url), Some(token)) => Some(RedisSettings { url, token }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "DFLOW_REDIS_URL and DFLOW_REDIS_TOKEN must both be set; projection disabled"
                );
                None
            }
            (None, None) => None,
        };

        let store = var("DFLOW_STORE")
            .map(|v| v.parse::<StoreKind>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            environment,
            cors_origins,
            redis,
            store,
            db_path: var("DFLOW_DB_PATH").map(PathBuf::from),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            cors_origins: Environment::Development.default_origins(),
            redis: None,
            store: StoreKind::Memory,
            db_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_development_defaults() {
        assert_eq!(config(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn staging_allows_preview_deployments() {
        let config = config(&[("DFLOW_ENVIRONMENT", "staging")]).unwrap();
        assert!(config
            .cors_origins
            .contains(&PREVIEW_ORIGIN_PATTERN.to_string()));
    }

    #[test]
    fn production_allows_nothing_by_default() {
        let config = config(&[("DFLOW_ENVIRONMENT", "Production")]).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn explicit_origins_replace_defaults() {
        let config = config(&[
            ("DFLOW_ENVIRONMENT", "staging"),
            ("DFLOW_CORS_ORIGINS", "https://flow.example.com, ,https://*.example.dev"),
        ])
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://flow.example.com", "https://*.example.dev"]
        );
    }

    #[test]
    fn redis_needs_url_and_token() {
        let half = config(&[("DFLOW_REDIS_URL", "https://redis.example.com")]).unwrap();
        assert!(half.redis.is_none());

        let full = config(&[
            ("DFLOW_REDIS_URL", "https://redis.example.com"),
            ("DFLOW_REDIS_TOKEN", "secret"),
        ])
        .unwrap();
        assert_eq!(full.redis.unwrap().token, "secret");
    }

    #[test]
    fn unknown_values_are_errors() {
        assert!(config(&[("DFLOW_ENVIRONMENT", "qa")]).is_err());
        assert!(config(&[("DFLOW_STORE", "postgres")]).is_err());
    }

    #[test]
    fn sqlite_store_with_path() {
        let config = config(&[("DFLOW_STORE", "sqlite"), ("DFLOW_DB_PATH", "/tmp/flow.db")]).unwrap();
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/flow.db")));
    }
}
