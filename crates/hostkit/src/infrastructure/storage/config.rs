//! TOML-based settings for hostkit.
//!
//! Read from `/etc/hostkit/config.toml` unless `--config` or
//! `HOSTKIT_CONFIG` points elsewhere.  Every field has a default, so the file
//! is optional and may list only the settings that differ:
//!
//! ```toml
//! [sshd]
//! directives = ["PermitRootLogin yes", "PasswordAuthentication yes", "Port 2222"]
//!
//! [runtime]
//! version = "go1.22.1"
//!
//! [backup]
//! dir = "/var/backups/hostkit"
//! retention = 10
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.

use std::path::{Path, PathBuf};

use hostkit_core::{Directive, DEFAULT_RETENTION};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::manage_runtime::RuntimeSettings;
use crate::application::patch_config::PatchConfig;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostkit/config.toml";

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostkitConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sshd: SshdConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` level used when neither `RUST_LOG` nor `-v` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// SSH daemon provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SshdConfig {
    #[serde(default = "default_sshd_config_path")]
    pub config_path: PathBuf,
    /// Written as `"Key value"` or `"Key=value"`.
    #[serde(default = "default_sshd_directives")]
    pub directives: Vec<Directive>,
    /// Service unit names, tried in order.
    #[serde(default = "default_service_units")]
    pub service_units: Vec<String>,
    /// Validator command; `{path}` is replaced by the file being checked.
    #[serde(default = "default_sshd_validate")]
    pub validate_command: Vec<String>,
}

/// Language runtime download and install locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default = "default_runtime_name")]
    pub name: String,
    #[serde(default = "default_runtime_name")]
    pub binary: String,
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
    /// Pins a version instead of the newest stable release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    /// Download directory; the system temp dir when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

/// Backup placement and rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupConfig {
    /// Directory for backups; next to each config file when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Timestamped backups kept per file.  At least 1.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_sshd_config_path() -> PathBuf {
    PathBuf::from("/etc/ssh/sshd_config")
}
fn default_sshd_directives() -> Vec<Directive> {
    [("PermitRootLogin", "yes"), ("PasswordAuthentication", "yes")]
        .into_iter()
        .filter_map(|(k, v)| Directive::new(k, v).ok())
        .collect()
}
fn default_service_units() -> Vec<String> {
    vec!["ssh".to_string(), "sshd".to_string()]
}
fn default_sshd_validate() -> Vec<String> {
    ["sshd", "-t", "-f", "{path}"].map(String::from).to_vec()
}
fn default_runtime_name() -> String {
    "go".to_string()
}
fn default_manifest_url() -> String {
    "https://go.dev/dl/?mode=json".to_string()
}
fn default_archive_url() -> String {
    "https://go.dev/dl/{version}.{os}-{arch}.tar.gz".to_string()
}
fn default_install_root() -> PathBuf {
    PathBuf::from("/usr/local")
}
fn default_profile_dir() -> PathBuf {
    PathBuf::from("/etc/profile.d")
}
fn default_version_args() -> Vec<String> {
    vec!["version".to_string()]
}
fn default_retention() -> usize {
    DEFAULT_RETENTION
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SshdConfig {
    fn default() -> Self {
        Self {
            config_path: default_sshd_config_path(),
            directives: default_sshd_directives(),
            service_units: default_service_units(),
            validate_command: default_sshd_validate(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: default_runtime_name(),
            binary: default_runtime_name(),
            manifest_url: default_manifest_url(),
            archive_url: default_archive_url(),
            version: None,
            install_root: default_install_root(),
            profile_dir: default_profile_dir(),
            version_args: default_version_args(),
            staging_dir: None,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: None,
            retention: default_retention(),
        }
    }
}

impl HostkitConfig {
    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup.retention == 0 {
            return Err(ConfigError::Invalid {
                field: "backup.retention",
                reason: "must keep at least one timestamped backup".to_string(),
            });
        }
        Ok(())
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl BackupConfig {
    /// Builds a [`PatchConfig`] for `file_path` with these backup settings.
    pub fn patch_config(&self, file_path: impl Into<PathBuf>, directives: Vec<Directive>) -> PatchConfig {
        let cfg = PatchConfig::new(file_path, directives).with_retention(self.retention);
        match &self.dir {
            Some(dir) => cfg.with_backup_dir(dir),
            None => cfg,
        }
    }
}

impl RuntimeConfig {
    pub fn settings(&self) -> RuntimeSettings {
        let defaults = RuntimeSettings::default();
        RuntimeSettings {
            name: self.name.clone(),
            binary: self.binary.clone(),
            manifest_url: self.manifest_url.clone(),
            archive_url: self.archive_url.clone(),
            version: self.version.clone(),
            install_root: self.install_root.clone(),
            profile_dir: self.profile_dir.clone(),
            version_args: self.version_args.clone(),
            staging_dir: self.staging_dir.clone().unwrap_or(defaults.staging_dir),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads settings from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config(path: &Path) -> Result<HostkitConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: HostkitConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostkitConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Renders settings as TOML, e.g. for `hostkit config show`.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if serialization fails.
pub fn render_config(config: &HostkitConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
