//! Engine facade.
//!
//! Ties the registry, URL codec, caches and build coordinator into the
//! surface the host's routing layer talks to: register bundles, emit
//! URLs at render time, answer decoded request paths with built
//! artifacts, drain watch events into invalidations.

use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::asset::{Asset, AssetKind, Convention, pre_minified_convention};
use crate::build::{BuildOutput, Coordinator};
use crate::bundle::{Bundle, BundleOptions, BundleRegistry, BundleSnapshot};
use crate::compress::CompressionKind;
use crate::epoch::{
    ConfiguredEpoch, EpochProvider, EpochStrategy, EpochToken, ProcessEpoch, WindowedEpoch,
};
use crate::error::Result;
use crate::log;
use crate::options::{BuildOptions, EngineConfig};
use crate::pipeline::StageRegistry;
use crate::route::{
    ChunkUrl, ParsedPath, RouteConfig, decode_path, encode_bundle_url, encode_urls,
    fileset_key_for_identities,
};
use crate::source::SourceProvider;
use crate::utils::hash::{Blake3Hasher, IdentityHasher};
use crate::watch::{AssetChanged, SourceWatcher};

pub struct Engine {
    config: EngineConfig,
    route: RouteConfig,
    registry: BundleRegistry,
    coordinator: Coordinator,
    source: Arc<dyn SourceProvider>,
    hasher: Arc<dyn IdentityHasher>,
    defaults: BundleOptions,
    watcher: Mutex<Option<SourceWatcher>>,
}

impl Engine {
    /// Engine with the built-in stages and the pre-minified convention.
    pub fn new(config: EngineConfig, source: Arc<dyn SourceProvider>) -> Self {
        Self::with_stages(
            config,
            source,
            StageRegistry::with_defaults(),
            vec![pre_minified_convention()],
        )
    }

    /// Engine over a custom stage registry and convention list.
    pub fn with_stages(
        config: EngineConfig,
        source: Arc<dyn SourceProvider>,
        stages: StageRegistry,
        conventions: Vec<Convention>,
    ) -> Self {
        let hasher: Arc<dyn IdentityHasher> = Arc::new(Blake3Hasher);
        let route = config.route_config();
        let coordinator =
            Coordinator::new(&config.cache_root, Arc::clone(&hasher), stages, conventions);
        Self {
            config,
            route,
            registry: BundleRegistry::new(),
            coordinator,
            source,
            hasher,
            defaults: BundleOptions::default(),
            watcher: Mutex::new(None),
        }
    }

    /// Replace the environment defaults ad-hoc composites build with.
    pub fn set_default_options(&mut self, defaults: BundleOptions) {
        self.defaults = defaults;
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn register(&self, bundle: Bundle) -> Result<()> {
        self.registry.register(bundle)
    }

    /// Append to a registered bundle; fails once the bundle has built.
    pub fn append_to(&self, name: &str, asset: Asset) -> Result<()> {
        self.registry.append(name, asset)
    }

    /// Append every asset of the bundle's kind under a source folder,
    /// in the provider's enumeration order. Returns how many were added.
    pub fn append_folder(&self, name: &str, folder: &str) -> Result<usize> {
        let snapshot = self.registry.snapshot(name)?;
        let members = self.source.resolve_folder(folder, snapshot.kind);
        for identity in &members {
            self.registry
                .append(name, Asset::new(identity, snapshot.kind))?;
        }
        Ok(members.len())
    }

    pub fn contains_bundle(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    // =========================================================================
    // URL emission
    // =========================================================================

    /// The combined request URL for a bundle.
    pub fn bundle_url(&self, name: &str, debug: bool) -> Result<String> {
        let snapshot = self.registry.snapshot(name)?;
        let options = snapshot.options_for(debug);
        let epoch = self.resolve_epoch(options);
        Ok(encode_bundle_url(
            &self.route,
            &snapshot.name,
            snapshot.kind,
            debug,
            &epoch,
        ))
    }

    /// URLs to embed for a bundle: one combined URL, or the raw source
    /// paths when the active profile disables combining.
    pub fn bundle_urls(&self, name: &str, debug: bool) -> Result<Vec<String>> {
        let snapshot = self.registry.snapshot(name)?;
        let options = snapshot.options_for(debug);
        if !options.combine {
            return Ok(snapshot
                .assets
                .iter()
                .map(|asset| format!("/{}", asset.path))
                .collect());
        }
        let epoch = self.resolve_epoch(options);
        Ok(vec![encode_bundle_url(
            &self.route,
            &snapshot.name,
            snapshot.kind,
            debug,
            &epoch,
        )])
    }

    /// Pack ad-hoc identities into chunked request URLs.
    pub fn asset_urls(
        &self,
        identities: &[String],
        kind: AssetKind,
        debug: bool,
    ) -> Result<Vec<ChunkUrl>> {
        let options = self.defaults.options_for(debug);
        let epoch = self.resolve_epoch(options);
        encode_urls(
            &self.route,
            identities,
            kind,
            debug,
            &epoch,
            self.hasher.as_ref(),
        )
    }

    /// Parse a request path. `None` is "not ours", never an error.
    pub fn decode(&self, path: &str) -> Option<ParsedPath> {
        decode_path(&self.route, path)
    }

    // =========================================================================
    // Builds
    // =========================================================================

    /// Build (or serve) a registered bundle under its own epoch.
    pub fn build_bundle(
        &self,
        name: &str,
        debug: bool,
        negotiated: CompressionKind,
    ) -> Result<BuildOutput> {
        let snapshot = self.registry.snapshot_for_build(name)?;
        let options = snapshot.options_for(debug).clone();
        let epoch = self.resolve_epoch(&options);
        self.build_snapshot(&snapshot, &options, negotiated, &epoch)
    }

    /// Build (or serve) an ad-hoc composite for decoded identities,
    /// addressed under the epoch the request URL carried.
    pub fn build_composite(
        &self,
        identities: &[String],
        kind: AssetKind,
        debug: bool,
        negotiated: CompressionKind,
        epoch: &EpochToken,
    ) -> Result<BuildOutput> {
        let options = self.defaults.options_for(debug).clone();
        let artifact = fileset_key_for_identities(identities, kind, self.hasher.as_ref());
        let assets: Vec<Asset> = identities
            .iter()
            .map(|identity| Asset::new(identity, kind))
            .collect();
        let compression = effective_compression(&options, negotiated);
        self.coordinator.build(
            &artifact,
            &assets,
            kind,
            &options,
            compression,
            epoch,
            self.source.as_ref(),
        )
    }

    /// Serve one request path end to end.
    ///
    /// `Ok(None)` means the path did not decode — the host should
    /// answer not-found. A single name matching a registered bundle is
    /// a bundle request; anything else is an ad-hoc composite.
    pub fn handle_request(
        &self,
        path: &str,
        negotiated: CompressionKind,
    ) -> Result<Option<BuildOutput>> {
        let Some(parsed) = self.decode(path) else {
            return Ok(None);
        };

        if let [name] = parsed.names.as_slice()
            && self.registry.contains(name)
        {
            let snapshot = self.registry.snapshot_for_build(name)?;
            let options = snapshot.options_for(parsed.debug).clone();
            return self
                .build_snapshot(&snapshot, &options, negotiated, &parsed.epoch)
                .map(Some);
        }

        let identities = parsed.identities();
        self.build_composite(
            &identities,
            parsed.kind,
            parsed.debug,
            negotiated,
            &parsed.epoch,
        )
        .map(Some)
    }

    /// Build every registered bundle for an environment, in parallel.
    /// Returns how many built cleanly; failures are logged and skipped.
    pub fn prewarm(&self, debug: bool) -> usize {
        self.registry
            .names()
            .par_iter()
            .filter(|name| match self.build_bundle(name, debug, CompressionKind::None) {
                Ok(_) => true,
                Err(err) => {
                    log!("error"; "prewarm of `{name}` failed: {err}");
                    false
                }
            })
            .count()
    }

    fn build_snapshot(
        &self,
        snapshot: &BundleSnapshot,
        options: &BuildOptions,
        negotiated: CompressionKind,
        epoch: &EpochToken,
    ) -> Result<BuildOutput> {
        let compression = effective_compression(options, negotiated);
        self.coordinator.build(
            &snapshot.name,
            &snapshot.assets,
            snapshot.kind,
            options,
            compression,
            epoch,
            self.source.as_ref(),
        )
    }

    fn resolve_epoch(&self, options: &BuildOptions) -> EpochToken {
        match options.epoch_strategy {
            EpochStrategy::Configured => ConfiguredEpoch::new(&self.config.epoch_value).current(),
            EpochStrategy::Process => ProcessEpoch.current(),
            EpochStrategy::Windowed => {
                WindowedEpoch::new(Duration::from_secs(self.config.epoch_window_secs)).current()
            }
        }
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Start watching `root` for source changes. Idempotent.
    pub fn watch_sources(&self, root: impl Into<PathBuf>) -> Result<()> {
        let mut slot = self.watcher.lock();
        if slot.is_none() {
            *slot = Some(SourceWatcher::spawn(root)?);
            log!("watch"; "watching sources for invalidation");
        }
        Ok(())
    }

    /// Pull pending change messages and invalidate dependent
    /// artifacts. Returns the number of artifacts invalidated.
    pub fn drain_changes(&self) -> usize {
        let slot = self.watcher.lock();
        let Some(watcher) = slot.as_ref() else {
            return 0;
        };
        let changes: Vec<AssetChanged> = watcher.changes().try_iter().collect();
        drop(slot);

        changes
            .iter()
            .map(|change| self.apply_change(change))
            .sum()
    }

    /// Invalidate every composite artifact depending on a changed
    /// identity. Returns how many artifacts were affected.
    pub fn apply_change(&self, change: &AssetChanged) -> usize {
        let dependents = self.coordinator.watches().dependents_of(&change.identity);
        if dependents.is_empty() {
            return 0;
        }

        log!(
            "watch";
            "{} {}, invalidating {} artifact(s)",
            change.identity,
            change.kind.label(),
            dependents.len()
        );
        for artifact in &dependents {
            if let Err(err) = self.coordinator.composites().remove_everywhere(artifact) {
                log!("error"; "could not invalidate `{artifact}`: {err}");
            }
        }
        dependents.len()
    }
}

/// Profile gate over the client-negotiated encoding.
fn effective_compression(options: &BuildOptions, negotiated: CompressionKind) -> CompressionKind {
    if options.compress {
        negotiated
    } else {
        CompressionKind::None
    }
}
