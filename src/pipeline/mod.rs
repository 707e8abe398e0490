//! Text processing pipeline.
//!
//! Transforms one asset's text through an ordered chain of stages with
//! middleware semantics: every stage receives the context plus a
//! continuation and decides whether the rest of the chain runs.
//!
//! ```text
//! ┌─────────┐   next   ┌─────────┐   next   ┌─────────┐
//! │ stage 0 │ ───────> │ stage 1 │ ───────> │ stage 2 │
//! └─────────┘          └─────────┘          └─────────┘
//!      │ (no next call = early termination, text kept as-is)
//! ```
//!
//! Stage lists are cheap to copy: clones share stage instances but
//! mutate independently, so conventions can rewrite one asset's chain
//! without touching the defaults.

mod minify;

pub use minify::{MinifyCss, MinifyJs};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;

use crate::asset::{Asset, AssetKind};
use crate::epoch::EpochToken;

// =============================================================================
// Stage identity
// =============================================================================

/// Stable tag identifying a stage inside a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    MinifyJs,
    MinifyCss,
    Custom(&'static str),
}

impl StageId {
    pub const fn name(self) -> &'static str {
        match self {
            Self::MinifyJs => "minify-js",
            Self::MinifyCss => "minify-css",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Stage trait and chain driver
// =============================================================================

/// One transformation step.
///
/// Stages are stateless and shared across builds; per-build data lives
/// in the context. A stage that returns without calling
/// [`Next::run`] terminates the pipeline early and the text stands as
/// last mutated.
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    fn process(&self, ctx: &mut ProcessingContext<'_>, next: Next<'_>) -> anyhow::Result<()>;
}

/// Continuation over the remaining stages.
///
/// Consumed by value: a stage can hand control onward at most once.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Stage>],
}

impl Next<'_> {
    pub fn run(self, ctx: &mut ProcessingContext<'_>) -> anyhow::Result<()> {
        match self.rest.split_first() {
            Some((stage, rest)) => {
                let id = stage.id();
                stage
                    .process(ctx, Next { rest })
                    .map_err(|err| attribute(id, err))
            }
            None => Ok(()),
        }
    }
}

/// Tag an error with the stage it escaped from, once.
fn attribute(id: StageId, err: anyhow::Error) -> anyhow::Error {
    if err.is::<StageFailure>() {
        err
    } else {
        anyhow::Error::new(StageFailure { stage: id, source: err })
    }
}

/// A stage error carrying the failing stage's identity.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: StageId,
    source: anyhow::Error,
}

impl StageFailure {
    pub fn into_source(self) -> anyhow::Error {
        self.source
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage `{}` failed", self.stage)
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Ordered, mutable stage list.
///
/// `clone()` yields an independently mutable list over the same stage
/// instances.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stages(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Run the chain over `ctx`. An empty pipeline leaves the text as-is.
    pub fn run(&self, ctx: &mut ProcessingContext<'_>) -> anyhow::Result<()> {
        Next { rest: &self.stages }.run(ctx)
    }

    pub fn push(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Remove the first stage with the given id. Returns whether one was found.
    pub fn remove(&mut self, id: StageId) -> bool {
        match self.stages.iter().position(|s| s.id() == id) {
            Some(idx) => {
                self.stages.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Insert directly after `anchor`, or at the end when the anchor is
    /// absent. Returns whether the anchor was found.
    pub fn insert_after(&mut self, anchor: StageId, stage: Arc<dyn Stage>) -> bool {
        match self.stages.iter().position(|s| s.id() == anchor) {
            Some(idx) => {
                self.stages.insert(idx + 1, stage);
                true
            }
            None => {
                self.stages.push(stage);
                false
            }
        }
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.stages.iter().any(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_ids()).finish()
    }
}

// =============================================================================
// Contexts
// =============================================================================

/// Per-asset processing state, mutated in place by stages.
pub struct ProcessingContext<'a> {
    pub text: String,
    pub asset: &'a Asset,
    pub build: &'a BuildContext,
}

/// Deferred text fragment rendered at combine time.
pub type Fragment = Box<dyn Fn() -> String + Send + Sync>;

/// Per-build-request scratch space.
///
/// Created when a build starts and dropped with the response. The
/// shared map lets stages coordinate across assets of one build; the
/// prepender/appender lists feed the stream combiner.
pub struct BuildContext {
    pub epoch: EpochToken,
    shared: Mutex<FxHashMap<String, Box<dyn Any + Send + Sync>>>,
    prependers: Mutex<Vec<Fragment>>,
    appenders: Mutex<Vec<Fragment>>,
}

impl BuildContext {
    pub fn new(epoch: EpochToken) -> Self {
        Self {
            epoch,
            shared: Mutex::new(FxHashMap::default()),
            prependers: Mutex::new(Vec::new()),
            appenders: Mutex::new(Vec::new()),
        }
    }

    /// Store a value under `key`, replacing any previous entry.
    pub fn set_shared<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.shared.lock().insert(key.into(), Box::new(value));
    }

    /// Borrow the value under `key` inside `f`, if present with type `T`.
    pub fn with_shared<T: Any, R>(&self, key: &str, f: impl FnOnce(Option<&T>) -> R) -> R {
        let guard = self.shared.lock();
        f(guard.get(key).and_then(|v| v.downcast_ref::<T>()))
    }

    /// Take ownership of the value under `key`, if present with type `T`.
    pub fn take_shared<T: Any + Send + Sync>(&self, key: &str) -> Option<T> {
        let boxed = self.shared.lock().remove(key)?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                // Wrong type requested: put it back untouched.
                self.shared.lock().insert(key.to_string(), other);
                None
            }
        }
    }

    pub fn add_prepender(&self, f: impl Fn() -> String + Send + Sync + 'static) {
        self.prependers.lock().push(Box::new(f));
    }

    pub fn add_appender(&self, f: impl Fn() -> String + Send + Sync + 'static) {
        self.appenders.lock().push(Box::new(f));
    }

    /// Render all prepender fragments in registration order.
    pub fn rendered_prependers(&self) -> Vec<String> {
        self.prependers.lock().iter().map(|f| f()).collect()
    }

    /// Render all appender fragments in registration order.
    pub fn rendered_appenders(&self) -> Vec<String> {
        self.appenders.lock().iter().map(|f| f()).collect()
    }
}

// =============================================================================
// Registry and defaults
// =============================================================================

/// Stage instances resolved once at engine construction.
pub struct StageRegistry {
    stages: FxHashMap<StageId, Arc<dyn Stage>>,
}

impl StageRegistry {
    /// Registry with the built-in minifier stages.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            stages: FxHashMap::default(),
        };
        registry.register(Arc::new(MinifyJs));
        registry.register(Arc::new(MinifyCss));
        registry
    }

    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.insert(stage.id(), stage);
    }

    pub fn get(&self, id: StageId) -> Option<Arc<dyn Stage>> {
        self.stages.get(&id).cloned()
    }

    /// Default chain for a kind: just the matching minifier, when
    /// minification is on.
    pub fn default_pipeline(&self, kind: AssetKind, minify: bool) -> Pipeline {
        let mut pipeline = Pipeline::new();
        if minify {
            let id = match kind {
                AssetKind::Script => StageId::MinifyJs,
                AssetKind::Style => StageId::MinifyCss,
            };
            if let Some(stage) = self.get(id) {
                pipeline.push(stage);
            }
        }
        pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;

    struct Tag(&'static str);

    impl Stage for Tag {
        fn id(&self) -> StageId {
            StageId::Custom(self.0)
        }

        fn process(&self, ctx: &mut ProcessingContext<'_>, next: Next<'_>) -> anyhow::Result<()> {
            ctx.text.push_str(self.0);
            next.run(ctx)
        }
    }

    struct Stop;

    impl Stage for Stop {
        fn id(&self) -> StageId {
            StageId::Custom("stop")
        }

        fn process(&self, ctx: &mut ProcessingContext<'_>, _next: Next<'_>) -> anyhow::Result<()> {
            ctx.text.push_str("!");
            Ok(())
        }
    }

    struct Fail;

    impl Stage for Fail {
        fn id(&self) -> StageId {
            StageId::Custom("fail")
        }

        fn process(&self, _ctx: &mut ProcessingContext<'_>, _next: Next<'_>) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    fn run(pipeline: &Pipeline, text: &str) -> anyhow::Result<String> {
        let asset = Asset::script("js/app.js");
        let build = BuildContext::new(EpochToken::new("1"));
        let mut ctx = ProcessingContext {
            text: text.to_string(),
            asset: &asset,
            build: &build,
        };
        pipeline.run(&mut ctx)?;
        Ok(ctx.text)
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(Tag("a"))).push(Arc::new(Tag("b")));
        assert_eq!(run(&pipeline, "").unwrap(), "ab");
    }

    #[test]
    fn test_empty_pipeline_keeps_text() {
        assert_eq!(run(&Pipeline::new(), "original").unwrap(), "original");
    }

    #[test]
    fn test_early_termination_skips_rest() {
        let mut pipeline = Pipeline::new();
        pipeline
            .push(Arc::new(Tag("a")))
            .push(Arc::new(Stop))
            .push(Arc::new(Tag("never")));
        assert_eq!(run(&pipeline, "").unwrap(), "a!");
    }

    #[test]
    fn test_failure_names_the_stage() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(Tag("a"))).push(Arc::new(Fail));

        let err = run(&pipeline, "").unwrap_err();
        let failure = err.downcast_ref::<StageFailure>().unwrap();
        assert_eq!(failure.stage, StageId::Custom("fail"));
    }

    #[test]
    fn test_clone_mutates_independently() {
        let mut base = Pipeline::new();
        base.push(Arc::new(Tag("a"))).push(Arc::new(Stop));

        let mut copy = base.clone();
        assert!(copy.remove(StageId::Custom("stop")));

        assert!(base.contains(StageId::Custom("stop")));
        assert!(!copy.contains(StageId::Custom("stop")));
    }

    #[test]
    fn test_insert_after_anchor() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(Tag("a"))).push(Arc::new(Tag("c")));
        let found = pipeline.insert_after(StageId::Custom("a"), Arc::new(Tag("b")));
        assert!(found);
        assert_eq!(run(&pipeline, "").unwrap(), "abc");
    }

    #[test]
    fn test_shared_state_coordination() {
        let build = BuildContext::new(EpochToken::new("1"));
        build.set_shared("count", 3usize);
        let doubled = build.with_shared("count", |v: Option<&usize>| v.copied().unwrap_or(0) * 2);
        assert_eq!(doubled, 6);
        assert_eq!(build.take_shared::<usize>("count"), Some(3));
        assert_eq!(build.take_shared::<usize>("count"), None);
    }

    #[test]
    fn test_fragments_render_in_order() {
        let build = BuildContext::new(EpochToken::new("1"));
        build.add_prepender(|| "/* head */".to_string());
        build.add_appender(|| "/* tail */".to_string());
        assert_eq!(build.rendered_prependers(), vec!["/* head */".to_string()]);
        assert_eq!(build.rendered_appenders(), vec!["/* tail */".to_string()]);
    }

    #[test]
    fn test_default_pipeline_respects_minify_flag() {
        let registry = StageRegistry::with_defaults();
        assert!(registry.default_pipeline(AssetKind::Script, false).is_empty());
        let minifying = registry.default_pipeline(AssetKind::Style, true);
        assert!(minifying.contains(StageId::MinifyCss));
    }
}
