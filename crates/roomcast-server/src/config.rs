use std::path::PathBuf;

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

/// Runtime settings, read from `ROOMCAST_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub allowed_origins: AllowedOrigins,
    /// Largest request body accepted, which bounds upload size.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            db_path: "roomcast.db".into(),
            allowed_origins: AllowedOrigins::List(vec!["http://localhost:5173".into()]),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = match lookup("ROOMCAST_PORT") {
            Some(v) => v.parse().with_context(|| format!("invalid ROOMCAST_PORT '{}'", v))?,
            None => defaults.port,
        };
        let max_upload_bytes = match lookup("ROOMCAST_MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid ROOMCAST_MAX_UPLOAD_BYTES '{}'", v))?,
            None => defaults.max_upload_bytes,
        };
        let allowed_origins = match lookup("ROOMCAST_ALLOWED_ORIGINS") {
            Some(v) => parse_origins(&v),
            None => defaults.allowed_origins,
        };

        Ok(Self {
            host: lookup("ROOMCAST_HOST").unwrap_or(defaults.host),
            port,
            db_path: lookup("ROOMCAST_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            allowed_origins,
            max_upload_bytes,
        })
    }
}

fn parse_origins(raw: &str) -> AllowedOrigins {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.iter().any(|o| o == "*") {
        AllowedOrigins::Any
    } else {
        AllowedOrigins::List(origins)
    }
}
