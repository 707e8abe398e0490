//! Content hashing behind a pluggable interface.
//!
//! All content-addressed names (fileset keys, per-file cache entries)
//! flow through one [`IdentityHasher`], so embedders can swap the
//! algorithm without touching cache layout code.
//!
//! # Usage
//!
//! ```ignore
//! let hasher = Blake3Hasher;
//! let key = hasher.hash("Test1/Test2"); // -> "af1349b9..."
//! ```

/// Hashes arbitrary text into a filesystem- and URL-safe token.
pub trait IdentityHasher: Send + Sync {
    fn hash(&self, text: &str) -> String;
}

/// Default hasher: blake3, hex-encoded, truncated to 16 chars.
///
/// 64 bits of digest is plenty for cache addressing while keeping
/// filenames and URLs short.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl IdentityHasher for Blake3Hasher {
    #[inline]
    fn hash(&self, text: &str) -> String {
        let digest = blake3::hash(text.as_bytes());
        hex::encode(&digest.as_bytes()[..8])
    }
}
