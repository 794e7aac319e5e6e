//! Command-line interface parsing for the cache-module demo binary
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into the settings and options the binary runs its cache with.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use serde_json::{json, Value};
use thiserror::Error;

use crate::cache::EXPIRATION_PATH;
use crate::settings::{MemorySettings, SettingsError};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The URL could not be parsed or is not http(s)
    #[error("Invalid URL: '{0}'. Expected an absolute http:// or https:// URL")]
    InvalidUrl(String),

    /// The cache name is empty or contains a '.'
    #[error("Invalid cache name: '{0}'. Names must be non-empty and must not contain '.'")]
    InvalidName(String),

    /// Repeat count of zero
    #[error("Invalid repeat count: must be at least 1")]
    InvalidRepeat,

    /// Concurrency of zero
    #[error("Invalid concurrency: must be at least 1")]
    InvalidConcurrency,

    /// The settings file could not be read
    #[error("Failed to read settings file {path}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON
    #[error("Failed to parse settings file: {0}")]
    SettingsParse(#[from] serde_json::Error),

    /// The settings could not be applied
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),
}

/// Fetch a JSON document repeatedly through an in-memory cache
#[derive(Parser, Debug)]
#[command(name = "cache-module")]
#[command(about = "Fetch a JSON document repeatedly through an in-memory cache")]
#[command(version)]
pub struct Cli {
    /// URL of the JSON document to fetch
    pub url: String,

    /// Cache name, used in log lines and to look up its expiration
    #[arg(long, default_value = "http")]
    pub name: String,

    /// Number of request rounds
    #[arg(long, default_value_t = 2)]
    pub repeat: u32,

    /// Pause between requests in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub interval_ms: u64,

    /// Expiration for this cache in milliseconds, overriding the settings file
    #[arg(long, value_name = "MS")]
    pub expiration_ms: Option<u64>,

    /// JSON settings file, e.g. {"cacheModules": {"expiration": {"default": 5000}}}
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Service method to invoke
    #[arg(long, default_value = "call")]
    pub method: String,

    /// Number of simultaneous requests issued in each round
    #[arg(long, default_value_t = 1)]
    pub concurrency: u32,

    /// Collapse concurrent misses into a single request
    #[arg(long)]
    pub coalesce: bool,
}

/// Configuration derived from CLI arguments for running the cache
#[derive(Debug)]
pub struct StartupConfig {
    /// Validated document URL
    pub url: String,
    /// Cache name
    pub name: String,
    /// Number of request rounds
    pub repeat: u32,
    /// Simultaneous requests per round
    pub concurrency: u32,
    /// Pause between requests
    pub interval: Duration,
    /// Service method to invoke
    pub method: String,
    /// Whether concurrent misses are coalesced
    pub coalesce: bool,
    /// Settings the cache reads its expiration from
    pub settings: MemorySettings,
}

/// Parses a URL argument, accepting only absolute http(s) URLs
pub fn parse_url_arg(s: &str) -> Result<String, CliError> {
    let url = Url::parse(s).map_err(|_| CliError::InvalidUrl(s.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        _ => Err(CliError::InvalidUrl(s.to_string())),
    }
}

/// Parses a cache name, rejecting names that would break settings paths
pub fn parse_name_arg(s: &str) -> Result<String, CliError> {
    if s.is_empty() || s.contains('.') {
        return Err(CliError::InvalidName(s.to_string()));
    }
    Ok(s.to_string())
}

/// Loads a JSON settings file into `MemorySettings`
pub fn load_settings(path: &Path) -> Result<MemorySettings, CliError> {
    let content = fs::read_to_string(path).map_err(|source| CliError::SettingsRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content)?;
    Ok(MemorySettings::from_value(value)?)
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with settings loaded and overrides applied
    /// * `Err(CliError)` if an argument or the settings file is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let url = parse_url_arg(&cli.url)?;
        let name = parse_name_arg(&cli.name)?;
        if cli.repeat == 0 {
            return Err(CliError::InvalidRepeat);
        }
        if cli.concurrency == 0 {
            return Err(CliError::InvalidConcurrency);
        }

        let settings = match &cli.settings {
            Some(path) => load_settings(path)?,
            None => MemorySettings::new(),
        };
        if let Some(ms) = cli.expiration_ms {
            settings.set(&format!("{}.{}", EXPIRATION_PATH, name), json!(ms))?;
        }

        Ok(StartupConfig {
            url,
            name,
            repeat: cli.repeat,
            concurrency: cli.concurrency,
            interval: Duration::from_millis(cli.interval_ms),
            method: cli.method.clone(),
            coalesce: cli.coalesce,
            settings,
        })
    }
}
