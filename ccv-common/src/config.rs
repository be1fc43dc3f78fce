//! Configuration loading for ChronoCanvas services
//!
//! Two-tier resolution with ENV > TOML priority. Every field has a default,
//! so the service starts with no config file at all (API keys then resolve
//! to "not configured" and the affected providers degrade at call time).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Error, Result};

/// Default bind host
const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port
const DEFAULT_PORT: u16 = 8000;
/// Default SQLite database path
const DEFAULT_DATABASE_PATH: &str = "ccv-art.db";
/// Default CORS origins (dev frontends)
const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:5173,http://localhost:3000,http://localhost:8080";

/// TOML-file shape: everything optional, ENV wins over file values
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<String>,
    pub cors_origins: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

/// API keys for the external collaborators
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub perplexity: Option<String>,
    pub xai: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind host for the HTTP server
    pub host: String,
    /// Bind port for the HTTP server
    pub port: u16,
    /// Path to the SQLite cache database
    pub database_path: PathBuf,
    /// Allowed CORS origins ("*" allows any)
    pub cors_origins: Vec<String>,
    /// External provider credentials
    pub keys: ApiKeys,
}

impl ServiceConfig {
    /// Load configuration from `CCV_CONFIG` (default `ccv-art.toml`) plus
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CCV_CONFIG").unwrap_or_else(|_| "ccv-art.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load configuration from a specific TOML path plus environment overrides.
    /// A missing file is not an error; a malformed file is.
    pub fn load_from(path: &Path) -> Result<Self> {
        let toml_config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::resolve(toml_config))
    }

    /// Apply ENV > TOML priority per field.
    pub fn resolve(toml_config: TomlConfig) -> Self {
        let host = resolve_field("CCV_HOST", toml_config.host, "host")
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = resolve_field("CCV_PORT", toml_config.port.map(|p| p.to_string()), "port")
            .and_then(|p| match p.parse() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!(value = %p, "Invalid port value, using default");
                    None
                }
            })
            .unwrap_or(DEFAULT_PORT);
        let database_path =
            resolve_field("CCV_DATABASE_PATH", toml_config.database_path, "database_path")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());
        let cors_origins =
            resolve_field("CCV_CORS_ORIGINS", toml_config.cors_origins, "cors_origins")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string());

        let keys = ApiKeys {
            openai: resolve_field("CCV_OPENAI_API_KEY", toml_config.openai_api_key, "openai_api_key"),
            anthropic: resolve_field(
                "CCV_ANTHROPIC_API_KEY",
                toml_config.anthropic_api_key,
                "anthropic_api_key",
            ),
            perplexity: resolve_field(
                "CCV_PERPLEXITY_API_KEY",
                toml_config.perplexity_api_key,
                "perplexity_api_key",
            ),
            xai: resolve_field("CCV_XAI_API_KEY", toml_config.xai_api_key, "xai_api_key"),
            spotify_client_id: resolve_field(
                "CCV_SPOTIFY_CLIENT_ID",
                toml_config.spotify_client_id,
                "spotify_client_id",
            ),
            spotify_client_secret: resolve_field(
                "CCV_SPOTIFY_CLIENT_SECRET",
                toml_config.spotify_client_secret,
                "spotify_client_secret",
            ),
        };

        Self {
            host,
            port,
            database_path: PathBuf::from(database_path),
            cors_origins: cors_origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            keys,
        }
    }
}

/// Resolve one field with ENV > TOML priority.
///
/// Warns when both sources carry a value (potential misconfiguration).
fn resolve_field(env_var: &str, toml_value: Option<String>, field: &str) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.filter(|v| !v.trim().is_empty());

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            field,
            "{} set in both environment and TOML. Using environment (highest priority).", field
        );
    }

    env_value.or(toml_value)
}
