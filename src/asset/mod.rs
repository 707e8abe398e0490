//! Asset model and naming conventions.

mod convention;
mod kind;

pub use convention::{Convention, pre_minified_convention};
pub use kind::AssetKind;

use crate::pipeline::Pipeline;
use crate::utils::path::{normalize_identity, strip_extension};

/// One combinable asset.
///
/// The identity is the normalized relative path the asset travels under
/// in URLs, cache keys and source lookups. Immutable once a build picks
/// it up; `pipeline_override` may still be rewritten by conventions
/// during build setup.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Normalized identity, relative to the source root.
    pub path: String,
    pub kind: AssetKind,
    /// Replaces the per-kind default pipeline when set.
    pub pipeline_override: Option<Pipeline>,
    /// Stable ordering weight; lower builds first.
    pub order_hint: i32,
}

impl Asset {
    pub fn new(path: impl AsRef<str>, kind: AssetKind) -> Self {
        Self {
            path: normalize_identity(path.as_ref()),
            kind,
            pipeline_override: None,
            order_hint: 0,
        }
    }

    /// Script asset from a raw path.
    pub fn script(path: impl AsRef<str>) -> Self {
        Self::new(path, AssetKind::Script)
    }

    /// Stylesheet asset from a raw path.
    pub fn style(path: impl AsRef<str>) -> Self {
        Self::new(path, AssetKind::Style)
    }

    pub fn with_order_hint(mut self, hint: i32) -> Self {
        self.order_hint = hint;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline_override = Some(pipeline);
        self
    }

    /// Identity without the kind extension: the name URLs carry.
    #[inline]
    pub fn stem(&self) -> &str {
        strip_extension(&self.path)
    }

    /// Whether the identity already names a minified build (`*.min.js`).
    #[inline]
    pub fn is_pre_minified(&self) -> bool {
        self.stem().ends_with(".min")
    }
}
