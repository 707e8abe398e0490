//! Cache epochs for artifact namespacing and cache busting.
//!
//! Every generated URL and every cache path carries an epoch token.
//! When the epoch changes, clients re-fetch (new URLs) and the engine
//! writes into a fresh key space, so stale artifacts are abandoned
//! rather than overwritten.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::utils::hash::{Blake3Hasher, IdentityHasher};

// ============================================================================
// EpochToken
// ============================================================================

/// URL-safe epoch value (alphanumeric and `-`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochToken(String);

impl EpochToken {
    /// Create a token, dropping any character that is not URL-safe.
    pub fn new(value: impl AsRef<str>) -> Self {
        let cleaned: String = value
            .as_ref()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        Self(cleaned)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EpochToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Source of the current epoch token.
pub trait EpochProvider: Send + Sync {
    fn current(&self) -> EpochToken;
}

/// Fixed epoch from configuration.
///
/// Stable across restarts; bump the configured value to invalidate
/// every client-cached URL at once.
#[derive(Debug, Clone)]
pub struct ConfiguredEpoch(pub EpochToken);

impl ConfiguredEpoch {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(EpochToken::new(value))
    }
}

impl EpochProvider for ConfiguredEpoch {
    fn current(&self) -> EpochToken {
        self.0.clone()
    }
}

/// Process start → epoch token mapping, computed once.
static PROCESS_EPOCH: LazyLock<EpochToken> = LazyLock::new(|| {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seed = format!("{}-{}", std::process::id(), nanos);
    EpochToken::new(Blake3Hasher.hash(&seed))
});

/// Fresh epoch per process lifetime.
///
/// Every restart moves all URLs and cache keys to a new namespace,
/// which doubles as an implicit cache reset on deploy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEpoch;

impl EpochProvider for ProcessEpoch {
    fn current(&self) -> EpochToken {
        PROCESS_EPOCH.clone()
    }
}

/// Timestamp rounded down to a window.
///
/// The token changes at most once per window, bounding how long a
/// stale client URL keeps resolving.
#[derive(Debug, Clone, Copy)]
pub struct WindowedEpoch {
    pub window: Duration,
}

impl WindowedEpoch {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl EpochProvider for WindowedEpoch {
    fn current(&self) -> EpochToken {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let window = self.window.as_secs().max(1);
        EpochToken::new((secs / window * window).to_string())
    }
}

// ============================================================================
// Strategy selection
// ============================================================================

/// Which epoch provider a build profile uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpochStrategy {
    /// Stable value from [`crate::EngineConfig`].
    #[default]
    Configured,
    /// Random per process lifetime.
    Process,
    /// Rounded timestamp window.
    Windowed,
}
