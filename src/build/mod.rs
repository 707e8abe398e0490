//! Build coordination.
//!
//! Drives one composite build end to end: cache-first short-circuit,
//! per-artifact single-flight locking, per-file ensure in resolved
//! order, combine, compress, persist. Every step before persist leaves
//! the stores untouched on failure, so a failed build retries cleanly
//! on the next request.
//!
//! ```text
//! CacheCheck -> AcquireLock -> DoubleCheck -> PerFileEnsure
//!            -> Combine -> Compress -> Persist -> Served
//! ```

pub(crate) mod flight;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::asset::{Asset, AssetKind, Convention};
use crate::cache::{CompositeStore, FileCache};
use crate::combine::combine;
use crate::compress::{CompressionKind, compress};
use crate::epoch::EpochToken;
use crate::error::{EngineError, Result};
use crate::log;
use crate::options::{BuildOptions, CacheControl};
use crate::pipeline::{BuildContext, Pipeline, StageRegistry};
use crate::source::SourceProvider;
use crate::utils::hash::IdentityHasher;
use crate::watch::WatchRegistry;
use flight::KeyedLocks;

// =============================================================================
// Output
// =============================================================================

/// Finished artifact handed back to the host.
#[derive(Debug)]
pub struct BuildOutput {
    pub bytes: Vec<u8>,
    /// Content type of the underlying asset kind.
    pub mime: &'static str,
    /// `Content-Encoding` value, when the artifact is compressed.
    pub encoding: Option<&'static str>,
    /// Caching policy of the profile that produced the artifact.
    pub cache_control: CacheControl,
    /// Artifact name under the composite store.
    pub artifact: String,
    /// Whether an existing artifact was served without building.
    pub from_cache: bool,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Orchestrates caches, pipeline and stores for composite builds.
pub struct Coordinator {
    files: FileCache,
    composites: CompositeStore,
    locks: KeyedLocks,
    stages: StageRegistry,
    conventions: Vec<Convention>,
    watches: WatchRegistry,
}

impl Coordinator {
    /// Both cache layers share `cache_root`; epoch directories keep
    /// per-file entries and composite artifacts from colliding.
    pub fn new(
        cache_root: impl Into<PathBuf>,
        hasher: Arc<dyn IdentityHasher>,
        stages: StageRegistry,
        conventions: Vec<Convention>,
    ) -> Self {
        let root = cache_root.into();
        Self {
            files: FileCache::new(&root, hasher),
            composites: CompositeStore::new(root),
            locks: KeyedLocks::new(),
            stages,
            conventions,
            watches: WatchRegistry::new(),
        }
    }

    pub fn watches(&self) -> &WatchRegistry {
        &self.watches
    }

    pub fn composites(&self) -> &CompositeStore {
        &self.composites
    }

    /// Produce the artifact for one request, at most once per artifact
    /// name under concurrency.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        artifact: &str,
        assets: &[Asset],
        kind: AssetKind,
        options: &BuildOptions,
        compression: CompressionKind,
        epoch: &EpochToken,
        source: &dyn SourceProvider,
    ) -> Result<BuildOutput> {
        // Serve an existing artifact without taking the lock.
        if let Some(bytes) = self.composites.read(epoch, compression, artifact) {
            return Ok(served(artifact, kind, options, compression, bytes, true));
        }

        let _flight = self.locks.lock(artifact);

        // A concurrent builder may have finished while we waited.
        if let Some(bytes) = self.composites.read(epoch, compression, artifact) {
            return Ok(served(artifact, kind, options, compression, bytes, true));
        }

        let bytes =
            self.run_build(artifact, assets, kind, options, compression, epoch, source)?;
        Ok(served(artifact, kind, options, compression, bytes, false))
    }

    /// Steps after the double-check: ensure, combine, compress,
    /// persist. Runs with the artifact lock held.
    #[allow(clippy::too_many_arguments)]
    fn run_build(
        &self,
        artifact: &str,
        assets: &[Asset],
        kind: AssetKind,
        options: &BuildOptions,
        compression: CompressionKind,
        epoch: &EpochToken,
        source: &dyn SourceProvider,
    ) -> Result<Vec<u8>> {
        let started = Instant::now();
        let build = BuildContext::new(epoch.clone());

        // Per-file ensure, in resolved order so stage side effects
        // (shared state, fragments) are deterministic.
        let mut entries = Vec::with_capacity(assets.len());
        for asset in assets {
            let pipeline = self.pipeline_for(asset, options);
            let entry =
                self.files
                    .ensure_processed(asset, &pipeline, &build, source, options.file_watch)?;
            if options.file_watch {
                self.watches.register(&asset.path, artifact);
            }
            entries.push(entry);
        }

        let mut streams = Vec::with_capacity(entries.len());
        for entry in &entries {
            streams.push(File::open(entry).map_err(|err| EngineError::io(entry, err))?);
        }

        let artifact_path = self.composites.artifact_path(epoch, compression, artifact);
        let mut combined = Vec::new();
        combine(
            &mut combined,
            &mut streams,
            kind.delimiter(),
            &build.rendered_prependers(),
            &build.rendered_appenders(),
        )
        .map_err(|err| EngineError::io(&artifact_path, err))?;

        let payload = compress(compression, options.compression_level, &combined)
            .map_err(|err| EngineError::io(&artifact_path, err))?;

        self.composites.write(epoch, compression, artifact, &payload)?;
        log!(
            "build";
            "{} <- {} assets, {} bytes, {} in {:.0?}",
            artifact,
            assets.len(),
            payload.len(),
            compression.dir_name(),
            started.elapsed()
        );
        Ok(payload)
    }

    /// Effective pipeline for one asset: explicit override or the kind
    /// default, then conventions in registration order.
    fn pipeline_for(&self, asset: &Asset, options: &BuildOptions) -> Pipeline {
        let mut pipeline = match &asset.pipeline_override {
            Some(custom) => custom.clone(),
            None => self.stages.default_pipeline(asset.kind, options.minify),
        };
        for convention in &self.conventions {
            convention.apply(asset, &mut pipeline);
        }
        pipeline
    }
}

fn served(
    artifact: &str,
    kind: AssetKind,
    options: &BuildOptions,
    compression: CompressionKind,
    bytes: Vec<u8>,
    from_cache: bool,
) -> BuildOutput {
    BuildOutput {
        bytes,
        mime: kind.mime(),
        encoding: compression.encoding(),
        cache_control: options.cache_control,
        artifact: artifact.to_string(),
        from_cache,
    }
}
