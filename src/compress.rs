//! Artifact compression.
//!
//! Compressed variants are fully materialized before persisting: the
//! store only ever sees complete byte buffers, never a partial stream.

use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Codec a composite artifact is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    None,
    Gzip,
    Deflate,
}

impl CompressionKind {
    /// Every codec, in store-directory order.
    pub const ALL: [Self; 3] = [Self::None, Self::Gzip, Self::Deflate];

    /// Directory name inside the composite store.
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }

    /// `Content-Encoding` value for the host's response, when one applies.
    pub const fn encoding(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
            Self::Deflate => Some("deflate"),
        }
    }

    /// Parse an `Accept-Encoding`-style token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            "identity" | "none" | "" => Some(Self::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Materialize `bytes` under the named codec. `None` is a passthrough.
pub fn compress(kind: CompressionKind, level: u32, bytes: &[u8]) -> io::Result<Vec<u8>> {
    let level = Compression::new(level.min(9));
    match kind {
        CompressionKind::None => Ok(bytes.to_vec()),
        CompressionKind::Gzip => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), level);
            encoder.write_all(bytes)?;
            encoder.finish()
        }
        CompressionKind::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), level);
            encoder.write_all(bytes)?;
            encoder.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{GzDecoder, ZlibDecoder};
    use std::io::Read;

    const SAMPLE: &[u8] = b"function hello() { return 'hello hello hello hello'; }\n";

    #[test]
    fn test_none_is_passthrough() {
        assert_eq!(compress(CompressionKind::None, 6, SAMPLE).unwrap(), SAMPLE);
    }

    #[test]
    fn test_gzip_roundtrip() {
        let packed = compress(CompressionKind::Gzip, 6, SAMPLE).unwrap();
        assert_ne!(packed, SAMPLE);

        let mut unpacked = Vec::new();
        GzDecoder::new(packed.as_slice())
            .read_to_end(&mut unpacked)
            .unwrap();
        assert_eq!(unpacked, SAMPLE);
    }

    #[test]
    fn test_deflate_roundtrip() {
        let packed = compress(CompressionKind::Deflate, 9, SAMPLE).unwrap();

        let mut unpacked = Vec::new();
        ZlibDecoder::new(packed.as_slice())
            .read_to_end(&mut unpacked)
            .unwrap();
        assert_eq!(unpacked, SAMPLE);
    }

    #[test]
    fn test_token_parsing() {
        assert_eq!(CompressionKind::from_token("gzip"), Some(CompressionKind::Gzip));
        assert_eq!(CompressionKind::from_token(" deflate "), Some(CompressionKind::Deflate));
        assert_eq!(CompressionKind::from_token("identity"), Some(CompressionKind::None));
        assert_eq!(CompressionKind::from_token("br"), None);
    }
}
