//! Asset source access.
//!
//! The engine never touches origin files directly; everything flows
//! through a [`SourceProvider`], so assets can live on disk, in an
//! embedded map, or behind whatever the host wires up.

use jwalk::WalkDir;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::asset::AssetKind;
use crate::error::{EngineError, Result};
use crate::utils::path::normalize_identity;

/// Read access to origin assets.
pub trait SourceProvider: Send + Sync {
    /// Asset text by identity. Missing or unreadable assets are a
    /// [`EngineError::SourceUnavailable`], never an empty string.
    fn read_text(&self, identity: &str) -> Result<String>;

    /// Last modification time, when the backing store tracks one.
    fn last_modified(&self, identity: &str) -> Option<SystemTime>;

    /// Expand a directory-like identity into member identities of a
    /// kind, in sorted path order.
    fn resolve_folder(&self, identity: &str, kind: AssetKind) -> Vec<String>;
}

// ============================================================================
// FsSource
// ============================================================================

/// Filesystem provider rooted at a source directory.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path an identity resolves to.
    pub fn full_path(&self, identity: &str) -> PathBuf {
        self.root.join(identity)
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl SourceProvider for FsSource {
    fn read_text(&self, identity: &str) -> Result<String> {
        std::fs::read_to_string(self.full_path(identity)).map_err(|_| {
            EngineError::SourceUnavailable {
                path: identity.to_string(),
            }
        })
    }

    fn last_modified(&self, identity: &str) -> Option<SystemTime> {
        std::fs::metadata(self.full_path(identity))
            .ok()?
            .modified()
            .ok()
    }

    fn resolve_folder(&self, identity: &str, kind: AssetKind) -> Vec<String> {
        let dir = self.full_path(identity);
        let mut found: Vec<String> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.root).ok()?.to_str()?.to_string();
                let ident = normalize_identity(&rel);
                (AssetKind::from_identity(&ident) == Some(kind)).then_some(ident)
            })
            .collect();
        found.sort();
        found
    }
}

// ============================================================================
// MemorySource
// ============================================================================

/// In-memory provider for embedded assets and tests.
///
/// Counts reads so callers can assert on cache behavior.
#[derive(Default)]
pub struct MemorySource {
    files: RwLock<FxHashMap<String, String>>,
    mtimes: RwLock<FxHashMap<String, SystemTime>>,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: impl AsRef<str>, text: impl Into<String>) {
        self.files
            .write()
            .insert(normalize_identity(identity.as_ref()), text.into());
    }

    /// Record a modification time for an identity.
    pub fn set_modified(&self, identity: impl AsRef<str>, time: SystemTime) {
        self.mtimes
            .write()
            .insert(normalize_identity(identity.as_ref()), time);
    }

    /// How many `read_text` calls were served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SourceProvider for MemorySource {
    fn read_text(&self, identity: &str) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .read()
            .get(identity)
            .cloned()
            .ok_or_else(|| EngineError::SourceUnavailable {
                path: identity.to_string(),
            })
    }

    fn last_modified(&self, identity: &str) -> Option<SystemTime> {
        self.mtimes.read().get(identity).copied()
    }

    fn resolve_folder(&self, identity: &str, kind: AssetKind) -> Vec<String> {
        let prefix = format!("{}/", identity.trim_end_matches('/'));
        let mut found: Vec<String> = self
            .files
            .read()
            .keys()
            .filter(|k| k.starts_with(&prefix) && AssetKind::from_identity(k) == Some(kind))
            .cloned()
            .collect();
        found.sort();
        found
    }
}
