//! Configuration for booki.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BOOKI_HOME, BOOKI_DB, BOOKI_SEARCH_URL)
//! 2. Config file (.booki/config.yaml)
//! 3. Defaults (~/.booki)
//!
//! Config file discovery:
//! - Searches current directory and parents for .booki/config.yaml
//! - Paths in the config file are relative to the .booki/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::openlibrary::{DEFAULT_ENDPOINT, DEFAULT_LIMIT};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub import: Option<ImportConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// SQLite database file
    pub database: Option<String>,
    /// Import queue log
    pub import_queue: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
    pub limit: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Single character, or "tab"
    pub delimiter: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub home: PathBuf,
    pub database: PathBuf,
    pub import_queue: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub search: SearchSettings,
    pub import: ImportSettings,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub endpoint: String,
    pub limit: usize,
    pub timeout_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            limit: DEFAULT_LIMIT,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub delimiter: u8,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".booki").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ if raw.len() == 1 && raw.is_ascii() => Ok(raw.as_bytes()[0]),
        _ => anyhow::bail!("Import delimiter must be a single ASCII character, got {:?}", raw),
    }
}

/// Merge a parsed config file (if any) with the environment
fn resolve(
    config: Option<ConfigFile>,
    config_file: Option<PathBuf>,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    let paths = config.as_ref().map(|c| c.paths.clone()).unwrap_or_default();

    let from_file = |value: &Option<String>| -> Option<PathBuf> {
        match (value, &config_dir) {
            (Some(p), Some(dir)) => Some(resolve_path(dir, p)),
            _ => None,
        }
    };

    let home = std::env::var("BOOKI_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| from_file(&paths.home))
        .unwrap_or(default_home);

    let database = std::env::var("BOOKI_DB")
        .map(PathBuf::from)
        .ok()
        .or_else(|| from_file(&paths.database))
        .unwrap_or_else(|| home.join("booki.db"));

    let import_queue = from_file(&paths.import_queue)
        .unwrap_or_else(|| home.join("import_queue.jsonl"));

    let mut search = SearchSettings::default();
    if let Some(s) = config.as_ref().and_then(|c| c.search.as_ref()) {
        if let Some(ref endpoint) = s.endpoint {
            search.endpoint = endpoint.clone();
        }
        search.limit = s.limit.unwrap_or(search.limit);
        search.timeout_seconds = s.timeout_seconds.unwrap_or(search.timeout_seconds);
    }
    if let Ok(endpoint) = std::env::var("BOOKI_SEARCH_URL") {
        search.endpoint = endpoint;
    }

    let mut import = ImportSettings::default();
    if let Some(raw) = config
        .as_ref()
        .and_then(|c| c.import.as_ref())
        .and_then(|i| i.delimiter.as_deref())
    {
        import.delimiter = parse_delimiter(raw)?;
    }

    Ok(ResolvedConfig {
        home,
        database,
        import_queue,
        config_file,
        search,
        import,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".booki");

    let config_file = find_config_file();
    let config = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    resolve(config, config_file, default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the database path
pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}

/// Get the import queue path
pub fn import_queue_path() -> Result<PathBuf> {
    Ok(config()?.import_queue.clone())
}
