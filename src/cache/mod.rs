//! Disk caches scoped by epoch.
//!
//! Two layers share one root directory. [`FileCache`] holds the
//! per-asset pipeline output, [`CompositeStore`] holds finished
//! combined artifacts, one copy per compression kind. Everything under
//! the root lives inside an epoch directory, so rotating the epoch
//! abandons stale state instead of deleting it.

mod composite;
mod file;

pub use composite::CompositeStore;
pub use file::FileCache;

use crate::error::{EngineError, Result};
use std::fs;
use std::path::Path;

/// Write `bytes` to `path` so readers never observe a partial file.
///
/// The payload lands in a sibling temp file first and is renamed over
/// the target, which is atomic on the filesystems we care about.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| EngineError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other("cache path has no parent directory"),
    })?;
    fs::create_dir_all(parent).map_err(|err| EngineError::io(parent, err))?;

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp-{}", std::process::id()));
    let tmp = std::path::PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|err| EngineError::io(&tmp, err))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(EngineError::io(path, err));
    }
    Ok(())
}
