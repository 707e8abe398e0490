//! URL codec: asset lists to request paths and back.
//!
//! Generated paths are self-describing: they carry the ordered name
//! list, the asset kind, a debug marker and the cache epoch, so a
//! request can be rebuilt from its path alone.
//!
//! Grammar (segments joined by `/`):
//!
//! ```text
//! /{base}/{name}…/{kind}/{v|d}{epoch}     keep_extensions = false
//! /{base}/{name}…/{v|d}{epoch}/{kind}     keep_extensions = true
//! ```
//!
//! With `keep_extensions` the path ends in the kind token, so hosts
//! that route by extension still recognize the resource type.

mod decode;
mod encode;

pub use decode::{ParsedPath, decode_path};
pub use encode::{ChunkUrl, encode_bundle_url, encode_urls};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::asset::AssetKind;
use crate::epoch::EpochToken;
use crate::utils::hash::IdentityHasher;

/// Characters kept readable inside a name segment. Everything else,
/// including `/`, is percent-encoded so one name stays one segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Budget headroom for URL punctuation: joining slashes, the version
/// marker, and slack for a scheme/host prefix.
pub const FIXED_OVERHEAD: usize = 10;

/// Routing parameters shared by encode and decode.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Path prefix all generated URLs live under.
    pub base_path: String,
    /// Upper bound no generated URL may reach.
    pub max_url_length: usize,
    /// End URLs with the kind token instead of the epoch segment.
    pub keep_extensions: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            base_path: "combined".to_string(),
            max_url_length: 2048,
            keep_extensions: false,
        }
    }
}

/// The name an identity travels under: the kind extension stripped,
/// percent-encoded into a single segment.
///
/// Only the canonical kind extension is stripped. An identity with an
/// alternate but recognizable extension (`app.mjs`) keeps it, so the
/// decoder can restore it verbatim.
pub(crate) fn url_name(identity: &str, kind: AssetKind) -> String {
    let suffix = match kind {
        AssetKind::Script => ".js",
        AssetKind::Style => ".css",
    };
    let stem = match identity.len().checked_sub(suffix.len()) {
        Some(cut) if identity.is_char_boundary(cut) && identity[cut..].eq_ignore_ascii_case(suffix) => {
            &identity[..cut]
        }
        _ => identity,
    };
    utf8_percent_encode(stem, SEGMENT).to_string()
}

/// Inverse of [`url_name`]: decoded name back to an identity.
pub(crate) fn identity_from_name(name: &str, kind: AssetKind) -> String {
    match AssetKind::from_identity(name) {
        Some(_) => name.to_string(),
        None => format!("{name}.{}", kind.extension()),
    }
}

/// Fileset key for an ordered name list: hash of the encoded,
/// `/`-joined form, the same text the encoder accumulates.
pub fn fileset_key(names: &[String], hasher: &dyn IdentityHasher) -> String {
    let joined = names
        .iter()
        .map(|n| utf8_percent_encode(n, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    hasher.hash(&joined)
}

/// [`fileset_key`] over full identities instead of decoded names, for
/// re-deriving an artifact key at build time.
pub fn fileset_key_for_identities(
    identities: &[String],
    kind: AssetKind,
    hasher: &dyn IdentityHasher,
) -> String {
    let joined = identities
        .iter()
        .map(|identity| url_name(identity, kind))
        .collect::<Vec<_>>()
        .join("/");
    hasher.hash(&joined)
}

/// Assemble a full request path from an already-encoded name section.
fn build_url(
    config: &RouteConfig,
    names: &str,
    kind: AssetKind,
    debug: bool,
    epoch: &EpochToken,
) -> String {
    let marker = if debug { 'd' } else { 'v' };
    let epoch_segment = format!("{marker}{epoch}");

    let mut segments: Vec<&str> = Vec::with_capacity(4);
    if !config.base_path.is_empty() {
        segments.push(&config.base_path);
    }
    segments.push(names);
    if config.keep_extensions {
        segments.push(&epoch_segment);
        segments.push(kind.token());
    } else {
        segments.push(kind.token());
        segments.push(&epoch_segment);
    }
    format!("/{}", segments.join("/"))
}
