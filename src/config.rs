//! Tool configuration.
//!
//! A small JSON file pins numeric precision, the export directory, and guard
//! suggestion limits so independent runs canonicalize and sign identically.
use crate::canonical::{CanonicalEncoder, DEFAULT_PRECISION};
use crate::guard::DEFAULT_SUGGESTION_LIMIT;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Current schema version for the config file.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Largest precision the encoder accepts.
pub const MAX_PRECISION: u32 = 12;
const DEFAULT_EXPORT_DIR: &str = "exports";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    pub schema_version: u32,
    #[serde(default = "default_precision")]
    pub precision: u32,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_key_id: Option<String>,
}

fn default_precision() -> u32 {
    DEFAULT_PRECISION
}

fn default_export_dir() -> String {
    DEFAULT_EXPORT_DIR.to_string()
}

fn default_suggestion_limit() -> usize {
    DEFAULT_SUGGESTION_LIMIT
}

impl TrustConfig {
    pub fn encoder(&self) -> CanonicalEncoder {
        CanonicalEncoder::new(self.precision)
    }

    /// Export directory resolved against `base`.
    pub fn export_dir_in(&self, base: &Path) -> PathBuf {
        base.join(&self.export_dir)
    }
}

pub fn default_config() -> TrustConfig {
    TrustConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        precision: DEFAULT_PRECISION,
        export_dir: default_export_dir(),
        suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        default_key_id: None,
    }
}

/// Render a pretty JSON config stub.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&default_config()).context("serialize config stub")
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<TrustConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: TrustConfig = serde_json::from_slice(&bytes).context("parse config JSON")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &TrustConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.precision > MAX_PRECISION {
        return Err(anyhow!(
            "precision must be <= {MAX_PRECISION} (got {})",
            config.precision
        ));
    }
    if config.suggestion_limit == 0 {
        return Err(anyhow!("suggestion_limit must be at least 1"));
    }
    let export_dir = Path::new(&config.export_dir);
    if config.export_dir.trim().is_empty()
        || export_dir.is_absolute()
        || export_dir
            .components()
            .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(anyhow!(
            "export_dir must be a relative path without '..' (got {:?})",
            config.export_dir
        ));
    }
    Ok(())
}
