//! Configuration management for webdetect using the prefer crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::StoreError;
use crate::vision::VisionConfig;

/// Default public base address for stored image objects.
pub const DEFAULT_STORAGE_BASE_URL: &str =
    "https://storage.googleapis.com/tindart-8c83b.firebasestorage.app";

/// Default active-id list document read by the backfill.
pub const DEFAULT_LIST_ID: &str = "RMCevRY4dGpUTTcrltun";

/// Default pause after each annotation call during a backfill.
pub const DEFAULT_DELAY_MS: u64 = 500;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Header carrying the verified caller uid, set by the fronting gateway
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_identity_header() -> String {
    "x-caller-uid".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            identity_header: default_identity_header(),
        }
    }
}

/// Which document store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Firestore,
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "sqlite" => Ok(StoreBackend::Sqlite),
            _ => Err(ConfigError::InvalidValue {
                key: "store.backend".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Google Cloud project owning the Firestore database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_firestore_endpoint")]
    pub endpoint: String,
    /// `host:port` of a local Firestore emulator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// SQLite database file (sqlite backend only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,
    #[serde(default = "default_images_collection")]
    pub images_collection: String,
    #[serde(default = "default_id_lists_collection")]
    pub id_lists_collection: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_firestore_endpoint() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_images_collection() -> String {
    "image-docs".to_string()
}

fn default_id_lists_collection() -> String {
    "doc-id-lists".to_string()
}

fn default_store_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            project_id: None,
            database: default_database(),
            endpoint: default_firestore_endpoint(),
            emulator_host: None,
            access_token: None,
            sqlite_path: None,
            images_collection: default_images_collection(),
            id_lists_collection: default_id_lists_collection(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Anchor a relative `sqlite_path` at `base_dir` (the config file's
    /// directory). `~` is expanded first.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if let Some(path) = self.sqlite_path.take() {
            self.sqlite_path = Some(resolve_path(&path, base_dir).display().to_string());
        }
    }

    /// Path of the SQLite database file.
    ///
    /// `~` is expanded; without an explicit path the file lives in the
    /// platform data directory.
    pub fn resolved_sqlite_path(&self) -> Result<PathBuf, StoreError> {
        if let Some(ref path) = self.sqlite_path {
            let expanded = shellexpand::tilde(path);
            return Ok(PathBuf::from(expanded.as_ref()));
        }

        dirs::data_local_dir()
            .map(|dir| dir.join("webdetect").join("documents.db"))
            .ok_or_else(|| {
                StoreError::Config(
                    "No data directory available; set store.sqlite_path".to_string(),
                )
            })
    }
}

fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Where stored image objects are publicly reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_base_url")]
    pub base_url: String,
}

fn default_storage_base_url() -> String {
    DEFAULT_STORAGE_BASE_URL.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: default_storage_base_url(),
        }
    }
}

impl StorageConfig {
    /// Public address of a stored object. The object name is appended to
    /// the base as stored, without re-encoding.
    pub fn object_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }
}

/// Batch backfill settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Active-id list document to process
    #[serde(default = "default_list_id")]
    pub list_id: String,
    /// Pause after each annotation call, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_list_id() -> String {
    DEFAULT_LIST_ID.to_string()
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            list_id: default_list_id(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path wins; otherwise prefer discovers a `webdetect`
    /// config file in the standard locations. Without any file the
    /// defaults are used. Environment overrides are applied last.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::load_from_path(path).await?,
            None => Self::discover().await?,
        };
        Ok(config.with_env_overrides())
    }

    async fn discover() -> Result<Self, ConfigError> {
        match prefer::load("webdetect").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(_) => {
                tracing::debug!("No webdetect config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// The format is picked from the extension (TOML, YAML, otherwise JSON).
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            })?,
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            })?,
            _ => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?,
        };

        tracing::debug!("Loaded config from {}", path.display());
        if let Some(base_dir) = path.parent() {
            config.store.resolve_paths(base_dir);
        }
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(&|key: &str| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Apply overrides from a variable lookup.
    pub fn with_overrides(mut self, var: &dyn Fn(&str) -> Option<String>) -> Self {
        if let Some(bind) = var("WEBDETECT_BIND") {
            self.server.bind = bind;
        } else if let Some(port) = var("PORT") {
            self.server.bind = format!("0.0.0.0:{}", port);
        }
        if let Some(header) = var("WEBDETECT_IDENTITY_HEADER") {
            self.server.identity_header = header.to_ascii_lowercase();
        }

        if let Some(backend) = var("WEBDETECT_STORE") {
            match backend.parse() {
                Ok(backend) => self.store.backend = backend,
                Err(e) => tracing::warn!("Ignoring WEBDETECT_STORE: {}", e),
            }
        }
        if let Some(path) = var("WEBDETECT_SQLITE_PATH") {
            self.store.sqlite_path = Some(path);
        }
        if let Some(project) = var("GOOGLE_CLOUD_PROJECT") {
            self.store.project_id = Some(project);
        }
        if let Some(host) = var("FIRESTORE_EMULATOR_HOST") {
            self.store.emulator_host = Some(host);
        }
        if let Some(token) = var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            self.store.access_token = Some(token);
        }

        self.vision = self.vision.with_overrides(var);

        if let Some(base) = var("STORAGE_BASE_URL") {
            self.storage.base_url = base;
        }
        if let Some(list_id) = var("BACKFILL_LIST_ID") {
            self.backfill.list_id = list_id;
        }
        if let Some(delay) = var("BACKFILL_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.backfill.delay_ms = delay;
        }

        self
    }
}
