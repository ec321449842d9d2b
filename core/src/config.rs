//! Connection parameters loaded from the process environment and `.env` files.

use std::collections::HashMap;
use std::fmt;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

pub const VAR_DB_NAME: &str = "db_name";
pub const VAR_USER: &str = "user";
pub const VAR_PASSWORD: &str = "password";
pub const VAR_HOST: &str = "host";
pub const VAR_PORT: &str = "port";

pub const DEFAULT_PORT: u16 = 5432;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing connection setting `{0}` (set it in the environment or .env)")]
    Missing(&'static str),
    #[error("invalid port {value:?}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("failed to read env file {}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Everything needed to open one PostgreSQL connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db_name: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("db_name", &self.db_name)
            .finish()
    }
}

impl ConnectionParams {
    /// Process environment layered over `./.env` (searched upwards) when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match dotenvy::dotenv_iter() {
            Ok(iter) => collect_env(iter, Path::new(".env"))?,
            Err(e) if e.not_found() => HashMap::new(),
            Err(source) => return Err(ConfigError::EnvFile { path: PathBuf::from(".env"), source }),
        };
        Self::from_layers(&file)
    }

    /// Process environment layered over the given env file, which must exist.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let iter = dotenvy::from_path_iter(path)
            .map_err(|source| ConfigError::EnvFile { path: path.to_path_buf(), source })?;
        let file = collect_env(iter, path)?;
        Self::from_layers(&file)
    }

    fn from_layers(file: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let port = match lookup(VAR_PORT).map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => v
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidPort { value: v.clone(), source })?,
            _ => DEFAULT_PORT,
        };
        Ok(ConnectionParams {
            host: required(VAR_HOST)?,
            port,
            user: required(VAR_USER)?,
            password: lookup(VAR_PASSWORD).unwrap_or_default(),
            db_name: required(VAR_DB_NAME)?,
        })
    }
}

fn collect_env<I>(iter: I, path: &Path) -> Result<HashMap<String, String>, ConfigError>
where
    I: Iterator<Item = dotenvy::Result<(String, String)>>,
{
    iter.collect::<Result<HashMap<_, _>, _>>()
        .map_err(|source| ConfigError::EnvFile { path: path.to_path_buf(), source })
}
