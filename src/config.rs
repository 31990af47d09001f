//! Configuration loading.
//!
//! Loads `config.toml` with per-section defaults, so a missing or empty file
//! is valid. Environment variables override file values.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::retry::Backoff;
use crate::seccomp::LOCAL_SECCOMP_PROFILE_PATH;
use crate::selinuxd::{DEFAULT_IMAGE_MAPPING, DEFAULT_IMAGE_VAR};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SPOD_RESOLVER_CONFIG";

/// Top-level resolver configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverConfig {
    /// Seccomp profile settings.
    #[serde(default)]
    pub seccomp: SeccompConfig,

    /// selinuxd image mapping settings.
    #[serde(default)]
    pub selinuxd: SelinuxdConfig,

    /// Backoff for operations that wait on other components.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Seccomp profile settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SeccompConfig {
    /// Base profile path, before any `localhost/` qualification.
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
}

impl Default for SeccompConfig {
    fn default() -> Self {
        Self {
            profile_path: default_profile_path(),
        }
    }
}

/// selinuxd image mapping settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SelinuxdConfig {
    /// JSON mapping file; the built-in mapping is used when unset.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,

    /// Variable consulted when no rule matches.
    #[serde(default = "default_image_var")]
    pub default_image_var: String,
}

impl Default for SelinuxdConfig {
    fn default() -> Self {
        Self {
            mapping_file: None,
            default_image_var: default_image_var(),
        }
    }
}

impl SelinuxdConfig {
    /// Raw JSON of the configured mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping file cannot be read.
    pub fn mapping_json(&self) -> anyhow::Result<Vec<u8>> {
        match &self.mapping_file {
            Some(path) => std::fs::read(path)
                .with_context(|| format!("failed to read image mapping {}", path.display())),
            None => Ok(DEFAULT_IMAGE_MAPPING.as_bytes().to_vec()),
        }
    }
}

/// Backoff settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on a single delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Delay growth factor.
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Random spread added to each delay (0.0 - 1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            factor: default_factor(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Convert into the combinator's schedule.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            max_attempts: self.max_attempts,
            initial: Duration::from_millis(self.initial_backoff_ms),
            factor: self.factor,
            max_delay: Duration::from_millis(self.max_backoff_ms),
            jitter: self.jitter,
        }
    }
}

// Default value functions for serde

fn default_profile_path() -> String {
    LOCAL_SECCOMP_PROFILE_PATH.to_owned()
}
fn default_image_var() -> String {
    DEFAULT_IMAGE_VAR.to_owned()
}
fn default_max_attempts() -> u32 {
    10
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_factor() -> f64 {
    2.0
}
fn default_jitter() -> f64 {
    0.1
}

impl ResolverConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// `path` takes priority over `$SPOD_RESOLVER_CONFIG` and the default
    /// location. A missing file at the resolved location yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path_with(env)?,
        };
        let mut config = load_config_or_default(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests need not touch the process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("SPOD_SECCOMP_PROFILE_PATH") {
            self.seccomp.profile_path = v;
        }
        if let Some(v) = env("SPOD_SELINUXD_MAPPING_FILE") {
            self.selinuxd.mapping_file = Some(PathBuf::from(v));
        }
        if let Some(v) = env("SPOD_RETRY_MAX_ATTEMPTS") {
            match v.parse() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => tracing::warn!(
                    var = "SPOD_RETRY_MAX_ATTEMPTS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }
}

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<ResolverConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: ResolverConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Load the config from `path`, or defaults if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_or_default(path: &Path) -> anyhow::Result<ResolverConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file found, using defaults");
        return Ok(ResolverConfig::default());
    }
    tracing::debug!(path = %path.display(), "loading config from file");
    load_config(path)
}

/// Resolve the default config directory (`~/.spod-resolver/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".spod-resolver"))
}

/// Resolve the config file path using a custom env resolver.
///
/// Checks `$SPOD_RESOLVER_CONFIG` first, then `config.toml` in
/// [`config_dir`].
///
/// # Errors
///
/// Returns an error if the env var is unset and the home directory cannot
/// be determined.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<PathBuf> {
    if let Some(p) = env(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(p));
    }
    Ok(config_dir()?.join("config.toml"))
}
