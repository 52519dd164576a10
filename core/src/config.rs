//! Configuration data structures for the extraction pipeline.
//!
//! This is the Collector input contract from §6 of the spec, modeled as a
//! serde-friendly struct tree so it can be loaded from a config file by a
//! front-end this crate does not implement. `ExtractorConfig::load_from_env_or_default`
//! follows the same "tolerant env loading + validation" shape as this
//! workspace's `GraphConfig::load_from_env_or_default`.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

/// Release tags a package is allowed to use, in descending order of publicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseTag {
    None,
    Internal,
    Alpha,
    Beta,
    Public,
}

impl ReleaseTag {
    /// `true` if `self` is at least as public as `other`.
    pub fn at_least_as_public_as(self, other: ReleaseTag) -> bool {
        self >= other
    }
}

impl std::fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReleaseTag::None => "@none",
            ReleaseTag::Internal => "@internal",
            ReleaseTag::Alpha => "@alpha",
            ReleaseTag::Beta => "@beta",
            ReleaseTag::Public => "@public",
        };
        f.write_str(s)
    }
}

/// Top-level configuration for a single package extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Path to the package's entry module (relative to the package root).
    pub entry_point: String,
    /// Release tags this package is allowed to emit; an entity tagged
    /// outside this set is a validation error, not merely a warning.
    pub allowed_release_tags: Vec<ReleaseTag>,
    /// Local-build flag: in a local build, warnings are reported but do not
    /// escalate to errors; in a CI/release build they do.
    pub is_local_build: bool,
    /// Whether to emit the API model JSON artifact alongside the review file.
    pub emit_api_model: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            entry_point: String::from("index.ts"),
            allowed_release_tags: vec![
                ReleaseTag::Public,
                ReleaseTag::Beta,
                ReleaseTag::Alpha,
                ReleaseTag::Internal,
            ],
            is_local_build: true,
            emit_api_model: true,
        }
    }
}

impl ExtractorConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Supported ENV vars (all optional):
    /// - `APISURFACE_ENTRY_POINT`      (path)
    /// - `APISURFACE_LOCAL_BUILD`      (bool: true/false/1/0)
    /// - `APISURFACE_EMIT_API_MODEL`   (bool)
    pub fn load_from_env_or_default() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(entry) = env::var("APISURFACE_ENTRY_POINT")
            && !entry.trim().is_empty() {
                cfg.entry_point = entry;
            }
        if let Some(v) = env_bool("APISURFACE_LOCAL_BUILD") {
            cfg.is_local_build = v;
        }
        if let Some(v) = env_bool("APISURFACE_EMIT_API_MODEL") {
            cfg.emit_api_model = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Basic validation — ensures the config is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.entry_point.trim().is_empty() {
            return Err(anyhow!("entry_point must not be empty"));
        }
        if self.allowed_release_tags.is_empty() {
            return Err(anyhow!("allowed_release_tags must not be empty"));
        }
        Ok(())
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|s| {
        let v = s.trim().to_ascii_lowercase();
        match v.as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[test]
    fn release_tag_ordering() {
        assert!(ReleaseTag::Public > ReleaseTag::Beta);
        assert!(ReleaseTag::Beta > ReleaseTag::Alpha);
        assert!(ReleaseTag::Alpha > ReleaseTag::Internal);
        assert!(ReleaseTag::Public.at_least_as_public_as(ReleaseTag::Alpha));
        assert!(!ReleaseTag::Alpha.at_least_as_public_as(ReleaseTag::Public));
    }

    #[test]
    fn empty_entry_point_is_invalid() {
        let mut cfg = ExtractorConfig::default();
        cfg.entry_point = String::new();
        assert!(cfg.validate().is_err());
    }
}
