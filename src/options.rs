//! Engine and build configuration.
//!
//! # Example
//!
//! ```toml
//! base_path = "combined"       # URL prefix for generated paths
//! max_url_length = 2048        # strict upper bound on URL length
//! cache_root = "/var/cache/sheaf"
//! keep_extensions = false      # end URLs with the kind token
//! epoch_value = "3"            # epoch for the `configured` strategy
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::epoch::EpochStrategy;
use crate::error::Result;
use crate::route::RouteConfig;

// ============================================================================
// EngineConfig
// ============================================================================

/// Engine-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path prefix all generated URLs live under.
    pub base_path: String,

    /// Upper bound no generated URL may reach.
    pub max_url_length: usize,

    /// Root directory for per-file and composite caches.
    pub cache_root: PathBuf,

    /// End URLs with the kind token so extension-routed hosts match.
    pub keep_extensions: bool,

    /// Epoch for the `configured` strategy; bump to invalidate clients.
    pub epoch_value: String,

    /// Window in seconds for the `windowed` strategy.
    pub epoch_window_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_path: "combined".to_string(),
            max_url_length: 2048,
            cache_root: std::env::temp_dir().join("sheaf-cache"),
            keep_extensions: false,
            epoch_value: "0".to_string(),
            epoch_window_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML string. File discovery stays with the host.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Routing parameters derived from this config.
    pub fn route_config(&self) -> RouteConfig {
        RouteConfig {
            base_path: self.base_path.clone(),
            max_url_length: self.max_url_length,
            keep_extensions: self.keep_extensions,
        }
    }
}

// ============================================================================
// BuildOptions
// ============================================================================

/// Client cache hints carried for the host's header logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheControl {
    pub etag: bool,
    pub max_age_hours: u32,
}

impl Default for CacheControl {
    fn default() -> Self {
        Self {
            etag: true,
            max_age_hours: 168,
        }
    }
}

/// One environment profile's build behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Combine assets into one artifact; off serves raw per-asset URLs.
    pub combine: bool,

    /// Allow compressed artifact variants.
    pub compress: bool,

    /// flate2 level for compressed artifacts (0-9).
    pub compression_level: u32,

    /// Run the minifier stage in default pipelines.
    pub minify: bool,

    /// Fold source mtimes into per-file cache keys and register
    /// assets with the watcher.
    pub file_watch: bool,

    pub cache_control: CacheControl,

    pub epoch_strategy: EpochStrategy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::production_defaults()
    }
}

impl BuildOptions {
    /// Development profile: raw text, watch-driven invalidation.
    pub fn debug_defaults() -> Self {
        Self {
            combine: true,
            compress: false,
            compression_level: 6,
            minify: false,
            file_watch: true,
            cache_control: CacheControl {
                etag: false,
                max_age_hours: 0,
            },
            epoch_strategy: EpochStrategy::Process,
        }
    }

    /// Production profile: minified, compressed, immutable sources.
    pub fn production_defaults() -> Self {
        Self {
            combine: true,
            compress: true,
            compression_level: 6,
            minify: true,
            file_watch: false,
            cache_control: CacheControl::default(),
            epoch_strategy: EpochStrategy::Configured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.base_path, "combined");
        assert_eq!(config.max_url_length, 2048);
        assert!(!config.keep_extensions);
    }

    #[test]
    fn test_engine_config_partial_override() {
        let config =
            EngineConfig::from_toml_str("base_path = \"static\"\nmax_url_length = 512").unwrap();
        assert_eq!(config.base_path, "static");
        assert_eq!(config.max_url_length, 512);
        // Untouched fields keep defaults.
        assert_eq!(config.epoch_value, "0");
    }

    #[test]
    fn test_engine_config_rejects_bad_toml() {
        assert!(EngineConfig::from_toml_str("max_url_length = \"big\"").is_err());
    }

    #[test]
    fn test_build_options_profiles() {
        let debug = BuildOptions::debug_defaults();
        assert!(!debug.minify);
        assert!(!debug.compress);
        assert!(debug.file_watch);

        let production = BuildOptions::production_defaults();
        assert!(production.minify);
        assert!(production.compress);
        assert_eq!(production.compression_level, 6);
        assert!(!production.file_watch);
        assert_eq!(production.epoch_strategy, EpochStrategy::Configured);
    }

    #[test]
    fn test_build_options_from_toml() {
        let options: BuildOptions =
            toml::from_str("minify = false\nepoch_strategy = \"windowed\"").unwrap();
        assert!(!options.minify);
        assert_eq!(options.epoch_strategy, EpochStrategy::Windowed);
        // serde(default) fills the rest from the production profile.
        assert!(options.combine);
    }
}
