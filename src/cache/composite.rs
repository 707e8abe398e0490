//! Persisted composite artifacts.
//!
//! One file per (epoch, compression, artifact name), fanned out as
//! `{root}/{epoch}/{compression}/{name}.s`. The name is either a
//! registered bundle name or the fileset key of an ad-hoc request.
//! Artifacts are write-once read-many; invalidation removes a name
//! across every compression directory so no encoding serves stale
//! bytes.

use std::fs;
use std::path::PathBuf;

use crate::compress::CompressionKind;
use crate::debug;
use crate::epoch::EpochToken;
use crate::error::{EngineError, Result};

const ARTIFACT_EXT: &str = "s";

pub struct CompositeStore {
    root: PathBuf,
}

impl CompositeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(
        &self,
        epoch: &EpochToken,
        compression: CompressionKind,
        name: &str,
    ) -> PathBuf {
        self.root
            .join(epoch.as_str())
            .join(compression.dir_name())
            .join(format!("{name}.{ARTIFACT_EXT}"))
    }

    pub fn contains(&self, epoch: &EpochToken, compression: CompressionKind, name: &str) -> bool {
        self.artifact_path(epoch, compression, name).is_file()
    }

    /// Stored bytes, or `None` when absent or unreadable. Readers never
    /// fail a request over a cache problem; the artifact just rebuilds.
    pub fn read(
        &self,
        epoch: &EpochToken,
        compression: CompressionKind,
        name: &str,
    ) -> Option<Vec<u8>> {
        fs::read(self.artifact_path(epoch, compression, name)).ok()
    }

    /// Persist `bytes` atomically, returning the artifact path.
    pub fn write(
        &self,
        epoch: &EpochToken,
        compression: CompressionKind,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = self.artifact_path(epoch, compression, name);
        super::write_atomic(&path, bytes)?;
        debug!("cache"; "stored composite {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Drop `name` from every compression directory of `epoch`.
    ///
    /// Missing artifacts are fine; any other filesystem refusal is
    /// surfaced so a stale artifact cannot linger silently.
    pub fn remove(&self, epoch: &EpochToken, name: &str) -> Result<()> {
        for compression in CompressionKind::ALL {
            let path = self.artifact_path(epoch, compression, name);
            match fs::remove_file(&path) {
                Ok(()) => debug!("cache"; "invalidated {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(EngineError::io(path, err)),
            }
        }
        Ok(())
    }

    /// Drop `name` under every epoch directory present on disk, so
    /// stale clients holding old-epoch URLs cannot fetch outdated
    /// bytes either.
    pub fn remove_everywhere(&self, name: &str) -> Result<()> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(EngineError::io(&self.root, err)),
        };
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let epoch = EpochToken::new(entry.file_name().to_string_lossy());
            self.remove(&epoch, name)?;
        }
        Ok(())
    }
}
