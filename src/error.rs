//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// EngineError
// ============================================================================

/// Errors surfaced by bundle registration, URL encoding and builds
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no bundle registered under `{0}`")]
    BundleNotFound(String),

    #[error("a bundle named `{0}` is already registered")]
    BundleExists(String),

    #[error("bundle `{0}` is sealed, assets cannot be added after the first build")]
    BundleSealed(String),

    #[error("invalid bundle name `{0}`: names must not contain `.` or `/`")]
    InvalidBundleName(String),

    #[error("dependency `{dependency}` does not fit into a URL of at most {limit} characters")]
    DependencyTooLong { dependency: String, limit: usize },

    #[error("stage `{stage}` failed on `{asset}`")]
    Stage {
        stage: String,
        asset: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("source `{path}` is unavailable")]
    SourceUnavailable { path: String },

    #[error("IO error at `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file watcher error")]
    Watch(#[from] notify::Error),

    #[error("options parsing error")]
    Toml(#[from] toml::de::Error),
}

impl EngineError {
    /// Attach a path to a raw IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_display_carries_context() {
        let err = EngineError::DependencyTooLong {
            dependency: "vendor/really-long-name.js".into(),
            limit: 64,
        };
        let display = format!("{err}");
        assert!(display.contains("vendor/really-long-name.js"));
        assert!(display.contains("64"));

        let err = EngineError::io("cache/v1/a.js", Error::new(ErrorKind::NotFound, "gone"));
        assert!(format!("{err}").contains("cache/v1/a.js"));
    }

    #[test]
    fn test_stage_error_preserves_source() {
        let err = EngineError::Stage {
            stage: "minify-js".into(),
            asset: "app.js".into(),
            source: anyhow::anyhow!("unexpected token"),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("unexpected token"));
    }
}
