//! Naming conventions: predicate-driven pipeline rewrites.
//!
//! Conventions run once per asset during build setup, after the
//! effective pipeline is resolved and before any stage executes. They
//! are an ordered list; later conventions see earlier rewrites.

use super::Asset;
use crate::pipeline::{Pipeline, StageId};

type AppliesFn = Box<dyn Fn(&Asset) -> bool + Send + Sync>;
type RewriteFn = Box<dyn Fn(&mut Pipeline) + Send + Sync>;

/// One predicate + pipeline transform pair.
pub struct Convention {
    pub name: &'static str,
    applies: AppliesFn,
    rewrite: RewriteFn,
}

impl Convention {
    pub fn new(
        name: &'static str,
        applies: impl Fn(&Asset) -> bool + Send + Sync + 'static,
        rewrite: impl Fn(&mut Pipeline) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            applies: Box::new(applies),
            rewrite: Box::new(rewrite),
        }
    }

    /// Rewrite `pipeline` if the predicate matches. Returns whether it fired.
    pub fn apply(&self, asset: &Asset, pipeline: &mut Pipeline) -> bool {
        if (self.applies)(asset) {
            (self.rewrite)(pipeline);
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Convention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convention").field("name", &self.name).finish()
    }
}

/// Skip re-minification for `*.min.js` / `*.min.css` identities.
pub fn pre_minified_convention() -> Convention {
    Convention::new(
        "pre-minified",
        Asset::is_pre_minified,
        |pipeline| {
            pipeline.remove(StageId::MinifyJs);
            pipeline.remove(StageId::MinifyCss);
        },
    )
}
