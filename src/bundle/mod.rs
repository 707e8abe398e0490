//! Named asset collections and their registry.
//!
//! A bundle pairs an ordered asset list with the build options of each
//! environment. Bundles are defined fluently, registered once under a
//! unique name, and looked up by name at request time. Assets may
//! still be appended after registration, but only until the first
//! build snapshots the bundle; from then on it is sealed.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::cmp::Ordering;

use crate::asset::{Asset, AssetKind};
use crate::error::{EngineError, Result};
use crate::options::BuildOptions;
use crate::pipeline::Pipeline;

/// Comparator deciding the combine order of two assets.
pub type OrderingFn = Box<dyn Fn(&Asset, &Asset) -> Ordering + Send + Sync>;

// =============================================================================
// Bundle
// =============================================================================

/// Per-environment build options of one bundle.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub debug: BuildOptions,
    pub production: BuildOptions,
}

impl BundleOptions {
    /// Build options for the requested environment.
    pub fn options_for(&self, debug: bool) -> &BuildOptions {
        if debug { &self.debug } else { &self.production }
    }
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            debug: BuildOptions::debug_defaults(),
            production: BuildOptions::production_defaults(),
        }
    }
}

pub struct Bundle {
    name: String,
    kind: AssetKind,
    assets: Vec<Asset>,
    options: BundleOptions,
    ordering: Option<OrderingFn>,
    pipeline: Option<Pipeline>,
}

impl Bundle {
    pub fn new(name: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            assets: Vec::new(),
            options: BundleOptions::default(),
            ordering: None,
            pipeline: None,
        }
    }

    pub fn script(name: impl Into<String>) -> Self {
        Self::new(name, AssetKind::Script)
    }

    pub fn style(name: impl Into<String>) -> Self {
        Self::new(name, AssetKind::Style)
    }

    /// Append a source path, taking the bundle's kind.
    pub fn add(mut self, path: impl AsRef<str>) -> Self {
        self.assets.push(Asset::new(path, self.kind));
        self
    }

    /// Append a fully configured asset.
    pub fn add_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_options(mut self, options: BundleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_debug_options(mut self, options: BuildOptions) -> Self {
        self.options.debug = options;
        self
    }

    pub fn with_production_options(mut self, options: BuildOptions) -> Self {
        self.options.production = options;
        self
    }

    /// Replace the default order (stable by order hint) with a custom
    /// comparator.
    pub fn with_ordering(
        mut self,
        cmp: impl Fn(&Asset, &Asset) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.ordering = Some(Box::new(cmp));
        self
    }

    /// Replace the per-kind default pipeline for every asset in this
    /// bundle. An asset carrying its own override keeps it.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Assets in combine order, with the bundle-level pipeline filled
    /// in where an asset has none of its own.
    fn resolved_assets(&self) -> Vec<Asset> {
        let mut assets = self.assets.clone();
        match &self.ordering {
            Some(cmp) => assets.sort_by(|a, b| cmp(a, b)),
            // Stable sort keeps registration order for equal hints.
            None => assets.sort_by_key(|a| a.order_hint),
        }
        if let Some(pipeline) = &self.pipeline {
            for asset in assets.iter_mut().filter(|a| a.pipeline_override.is_none()) {
                asset.pipeline_override = Some(pipeline.clone());
            }
        }
        assets
    }
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("assets", &self.assets.len())
            .field("custom_ordering", &self.ordering.is_some())
            .field("custom_pipeline", &self.pipeline.is_some())
            .finish()
    }
}

/// Immutable view taken when a build starts.
#[derive(Debug, Clone)]
pub struct BundleSnapshot {
    pub name: String,
    pub kind: AssetKind,
    pub assets: Vec<Asset>,
    pub options: BundleOptions,
}

impl BundleSnapshot {
    /// Build options for the requested environment.
    pub fn options_for(&self, debug: bool) -> &BuildOptions {
        self.options.options_for(debug)
    }
}

// =============================================================================
// Registry
// =============================================================================

struct Registered {
    bundle: Bundle,
    sealed: bool,
}

/// Concurrent name -> bundle table.
///
/// Entries lock individually through the map's shards, so lookups and
/// appends on unrelated bundles never contend.
#[derive(Default)]
pub struct BundleRegistry {
    bundles: DashMap<String, Registered>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundle under its unique name.
    pub fn register(&self, bundle: Bundle) -> Result<()> {
        validate_name(&bundle.name)?;
        match self.bundles.entry(bundle.name.clone()) {
            Entry::Occupied(_) => Err(EngineError::BundleExists(bundle.name)),
            Entry::Vacant(slot) => {
                slot.insert(Registered {
                    bundle,
                    sealed: false,
                });
                Ok(())
            }
        }
    }

    /// Append an asset to a registered bundle that has not built yet.
    pub fn append(&self, name: &str, asset: Asset) -> Result<()> {
        let mut entry = self
            .bundles
            .get_mut(name)
            .ok_or_else(|| EngineError::BundleNotFound(name.to_string()))?;
        if entry.sealed {
            return Err(EngineError::BundleSealed(name.to_string()));
        }
        entry.bundle.assets.push(asset);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bundles.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.bundles.iter().map(|e| e.key().clone()).collect()
    }

    /// Resolve a bundle for building: seals it and returns the ordered
    /// snapshot the build works from.
    pub fn snapshot_for_build(&self, name: &str) -> Result<BundleSnapshot> {
        let mut entry = self
            .bundles
            .get_mut(name)
            .ok_or_else(|| EngineError::BundleNotFound(name.to_string()))?;
        entry.sealed = true;
        let bundle = &entry.bundle;
        Ok(BundleSnapshot {
            name: bundle.name.clone(),
            kind: bundle.kind,
            assets: bundle.resolved_assets(),
            options: bundle.options.clone(),
        })
    }

    /// Like [`Self::snapshot_for_build`] but without sealing, for
    /// callers that only need to inspect the bundle (URL emission).
    pub fn snapshot(&self, name: &str) -> Result<BundleSnapshot> {
        let entry = self
            .bundles
            .get(name)
            .ok_or_else(|| EngineError::BundleNotFound(name.to_string()))?;
        let bundle = &entry.bundle;
        Ok(BundleSnapshot {
            name: bundle.name.clone(),
            kind: bundle.kind,
            assets: bundle.resolved_assets(),
            options: bundle.options.clone(),
        })
    }
}

/// Bundle names appear as a single URL segment, so the characters that
/// would collide with the path grammar are rejected outright.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('.') || name.contains('/') {
        return Err(EngineError::InvalidBundleName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluent_definition() {
        let bundle = Bundle::script("core")
            .add("js/a.js")
            .add("js/b.js")
            .add_asset(Asset::script("js/z.js").with_order_hint(-1));
        assert_eq!(bundle.name(), "core");
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn test_default_order_is_hint_then_registration() {
        let bundle = Bundle::script("core")
            .add_asset(Asset::script("js/second.js").with_order_hint(1))
            .add_asset(Asset::script("js/first.js").with_order_hint(-5))
            .add("js/third-a.js")
            .add("js/third-b.js");

        let order: Vec<_> = bundle
            .resolved_assets()
            .into_iter()
            .map(|a| a.path)
            .collect();
        assert_eq!(
            order,
            vec!["js/first.js", "js/third-a.js", "js/third-b.js", "js/second.js"]
        );
    }

    #[test]
    fn test_custom_ordering_wins() {
        let bundle = Bundle::style("theme")
            .add("css/b.css")
            .add("css/a.css")
            .with_ordering(|x, y| x.path.cmp(&y.path));

        let order: Vec<_> = bundle
            .resolved_assets()
            .into_iter()
            .map(|a| a.path)
            .collect();
        assert_eq!(order, vec!["css/a.css", "css/b.css"]);
    }

    #[test]
    fn test_bundle_pipeline_fills_missing_overrides() {
        let custom = Pipeline::new();
        let tagged = {
            let mut p = Pipeline::new();
            p.push(std::sync::Arc::new(crate::pipeline::MinifyCss));
            p
        };
        let bundle = Bundle::style("theme")
            .add("css/a.css")
            .add_asset(Asset::style("css/b.css").with_pipeline(tagged))
            .with_pipeline(custom);

        let assets = bundle.resolved_assets();
        // The plain asset picked up the bundle pipeline, the
        // preconfigured one kept its own.
        assert!(assets[0].pipeline_override.as_ref().unwrap().is_empty());
        assert!(!assets[1].pipeline_override.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = BundleRegistry::new();
        registry.register(Bundle::script("core")).unwrap();
        let err = registry.register(Bundle::script("core")).unwrap_err();
        assert!(matches!(err, EngineError::BundleExists(name) if name == "core"));
    }

    #[test]
    fn test_register_rejects_grammar_colliding_names() {
        let registry = BundleRegistry::new();
        for bad in ["", "core.js", "js/core"] {
            let err = registry.register(Bundle::script(bad)).unwrap_err();
            assert!(matches!(err, EngineError::InvalidBundleName(_)), "{bad}");
        }
    }

    #[test]
    fn test_append_until_first_build() {
        let registry = BundleRegistry::new();
        registry
            .register(Bundle::script("core").add("js/a.js"))
            .unwrap();

        registry.append("core", Asset::script("js/b.js")).unwrap();
        let snapshot = registry.snapshot_for_build("core").unwrap();
        assert_eq!(snapshot.assets.len(), 2);

        let err = registry
            .append("core", Asset::script("js/c.js"))
            .unwrap_err();
        assert!(matches!(err, EngineError::BundleSealed(name) if name == "core"));
    }

    #[test]
    fn test_append_unknown_bundle() {
        let registry = BundleRegistry::new();
        let err = registry
            .append("missing", Asset::script("js/a.js"))
            .unwrap_err();
        assert!(matches!(err, EngineError::BundleNotFound(_)));
    }

    #[test]
    fn test_plain_snapshot_does_not_seal() {
        let registry = BundleRegistry::new();
        registry
            .register(Bundle::style("theme").add("css/a.css"))
            .unwrap();

        let _view = registry.snapshot("theme").unwrap();
        registry.append("theme", Asset::style("css/b.css")).unwrap();
    }

    #[test]
    fn test_snapshot_options_per_environment() {
        let registry = BundleRegistry::new();
        registry.register(Bundle::script("core")).unwrap();
        let snapshot = registry.snapshot("core").unwrap();

        assert!(!snapshot.options_for(true).minify);
        assert!(snapshot.options_for(false).minify);
    }
}
