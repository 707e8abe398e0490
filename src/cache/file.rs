//! Per-asset pipeline output cache.
//!
//! Entries are keyed by a short hash of the asset identity and scoped
//! under the active epoch directory. With file watching on, the
//! source's last-modified time is folded into the key and each asset
//! gets its own subdirectory, so an edit produces a fresh entry while
//! the stale one is simply abandoned:
//!
//! ```text
//! {root}/{epoch}/{hash(identity)}.js                      watching off
//! {root}/{epoch}/{hash(identity)}/{hash(identity+mtime)}.js   on
//! ```
//!
//! A hit touches neither the source nor the pipeline. Misses are
//! serialized per identity, never globally, so two bundles sharing an
//! asset process it once while unrelated assets proceed in parallel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::asset::{Asset, AssetKind};
use crate::build::flight::KeyedLocks;
use crate::debug;
use crate::epoch::EpochToken;
use crate::error::{EngineError, Result};
use crate::pipeline::{BuildContext, Pipeline, ProcessingContext, StageFailure};
use crate::source::SourceProvider;
use crate::utils::hash::IdentityHasher;

pub struct FileCache {
    root: PathBuf,
    hasher: Arc<dyn IdentityHasher>,
    locks: KeyedLocks,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>, hasher: Arc<dyn IdentityHasher>) -> Self {
        Self {
            root: root.into(),
            hasher,
            locks: KeyedLocks::new(),
        }
    }

    /// Where the processed text for `identity` lives.
    ///
    /// `mtime` carries the source timestamp when watching; `None`
    /// selects the flat timestamp-free layout.
    pub fn entry_path(
        &self,
        identity: &str,
        kind: AssetKind,
        epoch: &EpochToken,
        mtime: Option<SystemTime>,
    ) -> PathBuf {
        let asset_hash = self.hasher.hash(identity);
        let ext = kind.extension();
        let scope = self.root.join(epoch.as_str());
        match mtime {
            Some(time) => {
                let stamp = time
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |since| since.as_nanos());
                let keyed = self.hasher.hash(&format!("{identity}@{stamp}"));
                scope.join(asset_hash).join(format!("{keyed}.{ext}"))
            }
            None => scope.join(format!("{asset_hash}.{ext}")),
        }
    }

    /// Make sure the processed entry for `asset` exists, returning its
    /// path.
    ///
    /// On a miss the source text runs through `pipeline` and the result
    /// is written atomically. A failing stage leaves the cache
    /// untouched.
    pub fn ensure_processed(
        &self,
        asset: &Asset,
        pipeline: &Pipeline,
        build: &BuildContext,
        source: &dyn SourceProvider,
        watch: bool,
    ) -> Result<PathBuf> {
        let mtime = if watch {
            source.last_modified(&asset.path)
        } else {
            None
        };
        let path = self.entry_path(&asset.path, asset.kind, &build.epoch, mtime);

        if path.exists() {
            return Ok(path);
        }

        let _guard = self.locks.lock(&asset.path);
        if path.exists() {
            // Someone else filled it while we waited.
            return Ok(path);
        }

        let text = source.read_text(&asset.path)?;
        let mut ctx = ProcessingContext {
            text,
            asset,
            build,
        };
        pipeline
            .run(&mut ctx)
            .map_err(|err| stage_error(asset, err))?;

        super::write_atomic(&path, ctx.text.as_bytes())?;
        debug!("cache"; "processed {} -> {}", asset.path, path.display());
        Ok(path)
    }
}

/// Map a pipeline error onto the engine taxonomy, preserving the
/// failing stage's name when the chain attributed it.
fn stage_error(asset: &Asset, err: anyhow::Error) -> EngineError {
    match err.downcast::<StageFailure>() {
        Ok(failure) => EngineError::Stage {
            stage: failure.stage.name().to_string(),
            asset: asset.path.clone(),
            source: failure.into_source(),
        },
        Err(other) => EngineError::Stage {
            stage: "pipeline".to_string(),
            asset: asset.path.clone(),
            source: other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Next, Stage, StageId};
    use crate::source::MemorySource;
    use crate::utils::hash::Blake3Hasher;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Upper;

    impl Stage for Upper {
        fn id(&self) -> StageId {
            StageId::Custom("upper")
        }

        fn process(&self, ctx: &mut ProcessingContext<'_>, next: Next<'_>) -> anyhow::Result<()> {
            ctx.text = ctx.text.to_uppercase();
            next.run(ctx)
        }
    }

    struct Explode;

    impl Stage for Explode {
        fn id(&self) -> StageId {
            StageId::Custom("explode")
        }

        fn process(&self, _ctx: &mut ProcessingContext<'_>, _next: Next<'_>) -> anyhow::Result<()> {
            anyhow::bail!("refused")
        }
    }

    fn cache_in(dir: &TempDir) -> FileCache {
        FileCache::new(dir.path(), Arc::new(Blake3Hasher))
    }

    fn upper_pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(Upper));
        pipeline
    }

    #[test]
    fn test_miss_processes_and_writes() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let source = MemorySource::new();
        source.insert("js/app.js", "var a;");
        let asset = Asset::script("js/app.js");
        let build = BuildContext::new(EpochToken::new("v1"));

        let path = cache
            .ensure_processed(&asset, &upper_pipeline(), &build, &source, false)
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "VAR A;");
        assert!(path.starts_with(dir.path().join("v1")));
        assert!(path.extension().is_some_and(|e| e == "js"));
    }

    #[test]
    fn test_hit_skips_source_and_pipeline() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let source = MemorySource::new();
        source.insert("js/app.js", "var a;");
        let asset = Asset::script("js/app.js");
        let build = BuildContext::new(EpochToken::new("v1"));
        let pipeline = upper_pipeline();

        let first = cache
            .ensure_processed(&asset, &pipeline, &build, &source, false)
            .unwrap();
        let second = cache
            .ensure_processed(&asset, &pipeline, &build, &source, false)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(source.reads(), 1);
    }

    #[test]
    fn test_epoch_scopes_entries() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let source = MemorySource::new();
        source.insert("js/app.js", "var a;");
        let asset = Asset::script("js/app.js");
        let pipeline = Pipeline::new();

        let old = cache
            .ensure_processed(
                &asset,
                &pipeline,
                &BuildContext::new(EpochToken::new("v1")),
                &source,
                false,
            )
            .unwrap();
        let new = cache
            .ensure_processed(
                &asset,
                &pipeline,
                &BuildContext::new(EpochToken::new("v2")),
                &source,
                false,
            )
            .unwrap();

        assert_ne!(old, new);
        assert!(old.exists(), "old epoch entry is abandoned, not deleted");
        assert!(new.exists());
    }

    #[test]
    fn test_mtime_changes_watched_entry() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let source = MemorySource::new();
        source.insert("css/site.css", "a { color: red }");
        let asset = Asset::style("css/site.css");
        let build = BuildContext::new(EpochToken::new("v1"));
        let pipeline = Pipeline::new();

        source.set_modified("css/site.css", UNIX_EPOCH + Duration::from_secs(100));
        let before = cache
            .ensure_processed(&asset, &pipeline, &build, &source, true)
            .unwrap();

        source.set_modified("css/site.css", UNIX_EPOCH + Duration::from_secs(200));
        let after = cache
            .ensure_processed(&asset, &pipeline, &build, &source, true)
            .unwrap();

        assert_ne!(before, after);
        // Both variants share the per-asset directory.
        assert_eq!(before.parent(), after.parent());
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn test_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let source = MemorySource::new();
        source.insert("js/bad.js", "var a;");
        let asset = Asset::script("js/bad.js");
        let build = BuildContext::new(EpochToken::new("v1"));
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(Explode));

        let err = cache
            .ensure_processed(&asset, &pipeline, &build, &source, false)
            .unwrap_err();

        match err {
            EngineError::Stage { stage, asset, .. } => {
                assert_eq!(stage, "explode");
                assert_eq!(asset, "js/bad.js");
            }
            other => panic!("unexpected error: {other}"),
        }
        let entry = cache.entry_path("js/bad.js", AssetKind::Script, &EpochToken::new("v1"), None);
        assert!(!entry.exists());
    }

    #[test]
    fn test_missing_source_reports_identity() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let source = MemorySource::new();
        let asset = Asset::script("js/ghost.js");
        let build = BuildContext::new(EpochToken::new("v1"));

        let err = cache
            .ensure_processed(&asset, &Pipeline::new(), &build, &source, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable { path } if path == "js/ghost.js"));
    }

    #[test]
    fn test_concurrent_misses_process_once() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let source = MemorySource::new();
        source.insert("js/app.js", "var a;");
        let asset = Asset::script("js/app.js");
        let build = BuildContext::new(EpochToken::new("v1"));
        let pipeline = upper_pipeline();

        std::thread::scope(|scope| {
            for _ in 0..6 {
                scope.spawn(|| {
                    cache
                        .ensure_processed(&asset, &pipeline, &build, &source, false)
                        .unwrap();
                });
            }
        });

        assert_eq!(source.reads(), 1);
    }
}
