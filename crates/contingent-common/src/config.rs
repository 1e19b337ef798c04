//! Configuration loading for Contingent.
//! Reads contingent.toml from the current directory or the path in CONTINGENT_CONFIG,
//! then applies CONTINGENT_* environment overrides for credentials and collection.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ContingentError, Result};

pub const CONFIG_ENV_VAR: &str = "CONTINGENT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "contingent.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContingentConfig {
    #[serde(default)]
    pub task_api: TaskApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

// ── Task API ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TaskApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default = "empty_secret")]
    pub password: SecretString,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn empty_secret() -> SecretString { SecretString::from("") }
fn default_owner() -> String { "user1".to_string() }
fn default_request_timeout() -> u64 { 30 }

impl Default for TaskApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: empty_secret(),
            collection_id: String::new(),
            owner: default_owner(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// ── Polling ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Poll until the job reaches a terminal status, ignoring `max_attempts`.
    #[serde(default)]
    pub unbounded: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_interval()     -> u64   { 2 }
fn default_max_attempts() -> u32   { 150 }
fn default_max_workers()  -> usize { 4 }

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_attempts: default_max_attempts(),
            unbounded: false,
            max_workers: default_max_workers(),
        }
    }
}

// ── Query ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub exposure_code: String,
    #[serde(default = "default_domain_table")]
    pub exposure_table: String,
    #[serde(default)]
    pub outcome_code: String,
    #[serde(default = "default_domain_table")]
    pub outcome_table: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default = "default_char_salt")]
    pub char_salt: String,
}

fn default_domain_table()     -> String { "Condition".to_string() }
fn default_protocol_version() -> String { "v2".to_string() }
fn default_char_salt()        -> String { "salt".to_string() }

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            exposure_code: String::new(),
            exposure_table: default_domain_table(),
            outcome_code: String::new(),
            outcome_table: default_domain_table(),
            protocol_version: default_protocol_version(),
            char_salt: default_char_salt(),
        }
    }
}

// ── Stats ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// "two-sided", "greater" or "less".
    #[serde(default = "default_alternative")]
    pub alternative: String,
    #[serde(default)]
    pub yates_correction: bool,
}

fn default_alpha()            -> f64    { 0.05 }
fn default_confidence_level() -> f64    { 0.95 }
fn default_alternative()      -> String { "two-sided".to_string() }

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            confidence_level: default_confidence_level(),
            alternative: default_alternative(),
            yates_correction: false,
        }
    }
}

impl TaskApiConfig {
    /// Settings needed before any request is sent.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ContingentError::Config("task_api.base_url must be set".into()));
        }
        if self.password.expose_secret().is_empty() && !self.username.is_empty() {
            return Err(ContingentError::Config(
                "task_api.password must be set when a username is configured".into(),
            ));
        }
        Ok(())
    }
}

/// What `load_with` does when no config file exists at the default path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingConfig {
    Error,
    UseDefaults,
}

impl ContingentConfig {
    /// Load configuration from contingent.toml.
    /// Uses `explicit` if given, then the CONTINGENT_CONFIG env var, then the
    /// current directory. Environment overrides are applied before validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, MissingConfig::Error, |key| std::env::var(key).ok())
    }

    /// Like `load`, but falls back to defaults when ./contingent.toml is
    /// absent. A missing file named explicitly is still an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, MissingConfig::UseDefaults, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(explicit: Option<&Path>, missing: MissingConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| lookup(CONFIG_ENV_VAR).map(PathBuf::from));
        let is_default = named.is_none();
        let path = named.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = match Self::load_from(&path) {
            Err(ContingentError::ConfigNotFound(_)) if is_default && missing == MissingConfig::UseDefaults => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Self::default()
            }
            other => other?,
        };
        config.apply_overrides(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without applying environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ContingentError::ConfigNotFound(path.display().to_string()));
        }
        debug!(path = %path.display(), "Reading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply CONTINGENT_* overrides using `lookup` to resolve variables.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CONTINGENT_TASK_API_BASE_URL") {
            self.task_api.base_url = v;
        }
        if let Some(v) = lookup("CONTINGENT_TASK_API_USERNAME") {
            self.task_api.username = v;
        }
        if let Some(v) = lookup("CONTINGENT_TASK_API_PASSWORD") {
            self.task_api.password = SecretString::from(v);
        }
        if let Some(v) = lookup("CONTINGENT_COLLECTION_ID") {
            self.task_api.collection_id = v;
        }
    }

    /// Checks every section except `[task_api]`, which only `build` needs.
    pub fn validate(&self) -> Result<()> {
        if self.polling.max_workers == 0 {
            return Err(ContingentError::Config("polling.max_workers must be at least 1".into()));
        }
        if !self.polling.unbounded && self.polling.max_attempts == 0 {
            return Err(ContingentError::Config(
                "polling.max_attempts must be at least 1 unless polling.unbounded is set".into(),
            ));
        }
        if !(self.stats.alpha > 0.0 && self.stats.alpha < 1.0) {
            return Err(ContingentError::Config(format!(
                "stats.alpha must be in (0, 1), got {}",
                self.stats.alpha
            )));
        }
        if !(self.stats.confidence_level > 0.0 && self.stats.confidence_level < 1.0) {
            return Err(ContingentError::Config(format!(
                "stats.confidence_level must be in (0, 1), got {}",
                self.stats.confidence_level
            )));
        }
        Ok(())
    }
}
