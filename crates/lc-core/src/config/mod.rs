//! Configuration loading for the collator.
//!
//! This module handles:
//! - Loading `collator.json`
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Per-field environment overrides (`LC_STORE_ROOT`, `LC_RENDER_EXPORT`)

use lc_rowstore::{CodecConfig, CompressionKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "log_collator";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "collator.json";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl From<ConfigError> for lc_common::Error {
    fn from(err: ConfigError) -> Self {
        lc_common::Error::Config(err.to_string())
    }
}

/// Collator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollatorConfig {
    /// Root directory of the filesystem object store.
    pub store_root: PathBuf,

    /// Whether to write the export rendering after each collation.
    pub render_export: bool,

    /// Compression codec for current and diff artifacts.
    pub compression: CompressionKind,

    /// Maximum rows per Parquet row group.
    pub row_group_size: usize,
}

impl Default for CollatorConfig {
    fn default() -> Self {
        CollatorConfig {
            store_root: default_store_root(),
            render_export: true,
            compression: CompressionKind::Snappy,
            row_group_size: lc_rowstore::writer::DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

impl CollatorConfig {
    /// Codec settings for artifact encoding.
    pub fn codec(&self) -> CodecConfig {
        CodecConfig::default()
            .with_compression(self.compression)
            .with_row_group_size(self.row_group_size)
    }
}

/// Default object store root under the XDG data dir.
pub fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join("store")
}

/// Configuration resolution options (CLI layer).
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
    /// Explicit store root.
    pub store_root: Option<PathBuf>,
    /// Explicit export switch.
    pub render_export: Option<bool>,
}

/// Resolved configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: CollatorConfig,
    /// File the config was read from (None if using defaults).
    pub source: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flags (via ConfigOptions)
/// 2. Environment variables (LC_CONFIG, LC_STORE_ROOT, LC_RENDER_EXPORT)
/// 3. XDG config home (~/.config/log_collator/collator.json)
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// [`load_config`] against an arbitrary variable lookup.
pub fn load_config_with<F>(options: &ConfigOptions, lookup: F) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut config, source) = match resolve_config_path(options, &lookup) {
        ConfigPath::Required(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound { path });
            }
            (load_config_file(&path)?, Some(path))
        }
        ConfigPath::Optional(path) if path.exists() => (load_config_file(&path)?, Some(path)),
        ConfigPath::Optional(_) => (CollatorConfig::default(), None),
    };

    // Environment overrides
    if let Some(root) = lookup("LC_STORE_ROOT").filter(|v| !v.is_empty()) {
        config.store_root = PathBuf::from(root);
    }
    if let Some(flag) = lookup("LC_RENDER_EXPORT") {
        config.render_export = parse_flag(&flag);
    }

    // CLI overrides take final precedence
    if let Some(root) = &options.store_root {
        config.store_root = root.clone();
    }
    if let Some(render) = options.render_export {
        config.render_export = render;
    }

    if config.row_group_size == 0 {
        return Err(ConfigError::InvalidValue {
            key: "row_group_size".to_string(),
            message: "must be positive".to_string(),
        });
    }

    Ok(ResolvedConfig { config, source })
}

/// Only a case-insensitive `true` enables the flag.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

enum ConfigPath {
    /// Named explicitly; must exist.
    Required(PathBuf),
    /// Conventional location; absence means defaults.
    Optional(PathBuf),
}

fn resolve_config_path<F>(options: &ConfigOptions, lookup: &F) -> ConfigPath
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Explicit option
    if let Some(path) = &options.config_path {
        return ConfigPath::Required(path.clone());
    }

    // 2. Environment variable
    if let Some(path) = lookup("LC_CONFIG").filter(|v| !v.is_empty()) {
        return ConfigPath::Required(PathBuf::from(path));
    }

    // 3. XDG config home
    let xdg_config = lookup("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });

    ConfigPath::Optional(xdg_config.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load a config file.
fn load_config_file(path: &Path) -> Result<CollatorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: Vec<(&str, String)>) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        move |key| map.get(key).cloned()
    }

    /// XDG home pointing at an empty temp dir, so no real config leaks in.
    fn empty_xdg(dir: &TempDir) -> (&'static str, String) {
        ("XDG_CONFIG_HOME", dir.path().display().to_string())
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let dir = TempDir::new().unwrap();
        let resolved = load_config_with(&ConfigOptions::default(), env(vec![empty_xdg(&dir)]))
            .unwrap();
        assert!(resolved.source.is_none());
        assert!(resolved.config.render_export);
        assert_eq!(resolved.config.compression, CompressionKind::Snappy);
    }

    #[test]
    fn test_xdg_file_is_read() {
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join(CONFIG_FILE_NAME),
            r#"{"store_root": "/srv/logs", "compression": "zstd"}"#,
        )
        .unwrap();

        let resolved = load_config_with(&ConfigOptions::default(), env(vec![empty_xdg(&dir)]))
            .unwrap();
        assert_eq!(resolved.config.store_root, PathBuf::from("/srv/logs"));
        assert_eq!(resolved.config.compression, CompressionKind::Zstd);
        assert!(resolved.config.render_export);
        assert!(resolved.source.is_some());
    }

    #[test]
    fn test_env_then_cli_precedence() {
        let dir = TempDir::new().unwrap();
        let lookup = env(vec![
            empty_xdg(&dir),
            ("LC_STORE_ROOT", "/from/env".to_string()),
            ("LC_RENDER_EXPORT", "FALSE".to_string()),
        ]);
        let resolved = load_config_with(&ConfigOptions::default(), &lookup).unwrap();
        assert_eq!(resolved.config.store_root, PathBuf::from("/from/env"));
        assert!(!resolved.config.render_export);

        let options = ConfigOptions {
            store_root: Some(PathBuf::from("/from/cli")),
            render_export: Some(true),
            ..Default::default()
        };
        let resolved = load_config_with(&options, &lookup).unwrap();
        assert_eq!(resolved.config.store_root, PathBuf::from("/from/cli"));
        assert!(resolved.config.render_export);
    }

    #[test]
    fn test_render_export_flag_parsing() {
        assert!(parse_flag("true"));
        assert!(parse_flag("True"));
        assert!(!parse_flag("1"));
        assert!(!parse_flag("yes"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let options = ConfigOptions {
            config_path: Some(PathBuf::from("/nonexistent/collator.json")),
            ..Default::default()
        };
        let err = load_config_with(&options, env(vec![])).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_json_and_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"store_rot": "/typo"}"#).unwrap();
        let options = ConfigOptions {
            config_path: Some(path),
            ..Default::default()
        };
        let err = load_config_with(&options, env(vec![])).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_zero_row_group_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        std::fs::write(&path, r#"{"row_group_size": 0}"#).unwrap();
        let options = ConfigOptions {
            config_path: Some(path),
            ..Default::default()
        };
        let err = load_config_with(&options, env(vec![])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
