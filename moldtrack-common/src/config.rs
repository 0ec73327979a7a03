//! Configuration loading and database path resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Default HTTP port for the API server
pub const DEFAULT_PORT: u16 = 5830;

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    /// Port for the HTTP API server
    pub port: u16,
}

impl Config {
    /// Resolve configuration following the priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. Environment variable (`MOLDTRACK_DB`, `MOLDTRACK_PORT`)
    /// 3. TOML config file (`~/.config/moldtrack/config.toml`)
    /// 4. Compiled default (fallback)
    pub fn resolve(cli_database: Option<&str>, cli_port: Option<u16>) -> Result<Config> {
        let file = load_config_file();

        let database_path = resolve_database_path(cli_database, file.as_ref());
        let port = resolve_port(cli_port, file.as_ref())?;

        Ok(Config {
            database_path,
            port,
        })
    }
}

fn resolve_database_path(cli_arg: Option<&str>, file: Option<&toml::Value>) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("MOLDTRACK_DB") {
        return PathBuf::from(path);
    }

    if let Some(path) = file
        .and_then(|v| v.get("database_path"))
        .and_then(|v| v.as_str())
    {
        return PathBuf::from(path);
    }

    default_database_path()
}

fn resolve_port(cli_arg: Option<u16>, file: Option<&toml::Value>) -> Result<u16> {
    if let Some(port) = cli_arg {
        return Ok(port);
    }

    if let Ok(raw) = std::env::var("MOLDTRACK_PORT") {
        return raw
            .parse()
            .map_err(|_| Error::Config(format!("Invalid MOLDTRACK_PORT value: {}", raw)));
    }

    if let Some(port) = file.and_then(|v| v.get("port")).and_then(|v| v.as_integer()) {
        return u16::try_from(port)
            .map_err(|_| Error::Config(format!("Port out of range in config file: {}", port)));
    }

    Ok(DEFAULT_PORT)
}

/// Read and parse the platform config file, if one exists
fn load_config_file() -> Option<toml::Value> {
    let path = dirs::config_dir()?.join("moldtrack").join("config.toml");
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("moldtrack"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/moldtrack"))
        .join("moldtrack.db")
}
