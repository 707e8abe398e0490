//! Source change detection and invalidation bookkeeping.
//!
//! ```text
//! notify -> Debouncer (pure timing) -> AssetChanged messages
//! ```
//!
//! Watch events travel as typed [`AssetChanged`] messages over a
//! channel rather than ambient callbacks; the engine drains them and
//! consults the [`WatchRegistry`] to find which composite artifacts
//! each identity invalidates.

mod debounce;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::log;
use crate::utils::path::normalize_identity;
use debounce::Debouncer;

// =============================================================================
// Messages
// =============================================================================

/// What happened to a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// One debounced source change, addressed by asset identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetChanged {
    pub identity: String,
    pub kind: ChangeKind,
}

// =============================================================================
// Registry
// =============================================================================

/// Identity -> dependent composite artifact names.
///
/// Registration is idempotent: an identity already tracked for an
/// artifact is not re-added, so repeated builds of the same bundle
/// keep exactly one watch per asset.
#[derive(Default)]
pub struct WatchRegistry {
    dependents: DashMap<String, Vec<String>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identity: &str, artifact: &str) {
        let mut entry = self.dependents.entry(identity.to_string()).or_default();
        if !entry.iter().any(|existing| existing == artifact) {
            entry.push(artifact.to_string());
        }
    }

    pub fn is_watched(&self, identity: &str) -> bool {
        self.dependents.contains_key(identity)
    }

    /// Artifact names to invalidate when `identity` changes.
    pub fn dependents_of(&self, identity: &str) -> Vec<String> {
        self.dependents
            .get(identity)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn watched_count(&self) -> usize {
        self.dependents.len()
    }
}

// =============================================================================
// Watcher
// =============================================================================

/// Watches a source root and emits [`AssetChanged`] messages.
///
/// The notify handle must stay alive for events to flow; dropping the
/// watcher disconnects the channel and stops the pump thread.
pub struct SourceWatcher {
    changes: Receiver<AssetChanged>,
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Start watching `root` recursively.
    ///
    /// Events buffer immediately, so changes racing the first build are
    /// not lost.
    pub fn spawn(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let (raw_tx, raw_rx) = channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |result| {
            let _ = raw_tx.send(result);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let (tx, changes) = channel::unbounded();
        std::thread::spawn(move || pump(&root, &raw_rx, &tx));

        Ok(Self {
            changes,
            _watcher: watcher,
        })
    }

    /// Channel of debounced changes, ready for `try_iter` draining.
    pub fn changes(&self) -> &Receiver<AssetChanged> {
        &self.changes
    }
}

/// Debounce loop: fold raw notify events, flush stable batches as
/// identity-addressed messages.
fn pump(
    root: &Path,
    raw: &Receiver<notify::Result<notify::Event>>,
    out: &Sender<AssetChanged>,
) {
    let mut debouncer = Debouncer::new();
    loop {
        match raw.recv_timeout(debouncer.sleep_duration()) {
            Ok(Ok(event)) => debouncer.add_event(&event),
            Ok(Err(err)) => log!("watch"; "notify error: {err}"),
            Err(RecvTimeoutError::Timeout) => {
                let Some(batch) = debouncer.take_if_ready() else {
                    continue;
                };
                for (path, kind) in batch {
                    let message = AssetChanged {
                        identity: identity_for(root, &path),
                        kind,
                    };
                    if out.send(message).is_err() {
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Map an absolute changed path back to the identity space used at
/// registration (relative to the watched root, forward slashes).
fn identity_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    normalize_identity(&relative.to_string_lossy())
}
