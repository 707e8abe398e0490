//! Greedy order-preserving URL packing.

use percent_encoding::utf8_percent_encode;

use super::{FIXED_OVERHEAD, RouteConfig, SEGMENT, build_url, url_name};
use crate::asset::AssetKind;
use crate::epoch::EpochToken;
use crate::error::{EngineError, Result};
use crate::utils::hash::IdentityHasher;

/// One packed chunk: artifact key plus the request path addressing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUrl {
    pub key: String,
    pub url: String,
}

/// Pack ordered identities into as few URLs as a single forward pass
/// allows, each strictly shorter than `max_url_length`.
///
/// Identities are never reordered. Before a name is accepted into the
/// current chunk, the projected URL length (accumulated names, base
/// path, kind token, epoch, [`FIXED_OVERHEAD`]) is checked against the
/// budget; on overflow the chunk is flushed and the name retried
/// against an empty accumulator. A name that cannot fit even alone is
/// a [`EngineError::DependencyTooLong`].
pub fn encode_urls(
    config: &RouteConfig,
    identities: &[String],
    kind: AssetKind,
    debug: bool,
    epoch: &EpochToken,
    hasher: &dyn IdentityHasher,
) -> Result<Vec<ChunkUrl>> {
    let fixed = config.base_path.len()
        + kind.token().len()
        + epoch.as_str().len()
        + FIXED_OVERHEAD;

    let mut chunks = Vec::new();
    let mut accumulated = String::new();

    for identity in identities {
        let name = url_name(identity, kind);
        loop {
            let delimited = if accumulated.is_empty() {
                name.len()
            } else {
                name.len() + 1
            };
            if accumulated.len() + delimited + fixed >= config.max_url_length {
                if accumulated.is_empty() {
                    return Err(EngineError::DependencyTooLong {
                        dependency: identity.clone(),
                        limit: config.max_url_length,
                    });
                }
                chunks.push(flush(config, &accumulated, kind, debug, epoch, hasher));
                accumulated.clear();
                continue;
            }
            if !accumulated.is_empty() {
                accumulated.push('/');
            }
            accumulated.push_str(&name);
            break;
        }
    }

    if !accumulated.is_empty() {
        chunks.push(flush(config, &accumulated, kind, debug, epoch, hasher));
    }
    Ok(chunks)
}

fn flush(
    config: &RouteConfig,
    accumulated: &str,
    kind: AssetKind,
    debug: bool,
    epoch: &EpochToken,
    hasher: &dyn IdentityHasher,
) -> ChunkUrl {
    ChunkUrl {
        key: hasher.hash(accumulated),
        url: build_url(config, accumulated, kind, debug, epoch),
    }
}

/// Request path for a named bundle: a single name segment, same
/// grammar as packed chunks.
pub fn encode_bundle_url(
    config: &RouteConfig,
    name: &str,
    kind: AssetKind,
    debug: bool,
    epoch: &EpochToken,
) -> String {
    let encoded = utf8_percent_encode(name, SEGMENT).to_string();
    build_url(config, &encoded, kind, debug, epoch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::Blake3Hasher;

    fn bare(max_url_length: usize) -> RouteConfig {
        RouteConfig {
            base_path: String::new(),
            max_url_length,
            keep_extensions: false,
        }
    }

    fn idents(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_single_dependency_too_long() {
        let err = encode_urls(
            &bare(10),
            &idents(&["Test1.js"]),
            AssetKind::Script,
            false,
            &EpochToken::new("1"),
            &Blake3Hasher,
        )
        .unwrap_err();
        match err {
            EngineError::DependencyTooLong { dependency, limit } => {
                assert_eq!(dependency, "Test1.js");
                assert_eq!(limit, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tight_budget_splits_into_two_chunks() {
        let chunks = encode_urls(
            &bare(14 + 10),
            &idents(&["Test1.js", "Test2.js"]),
            AssetKind::Script,
            false,
            &EpochToken::new("1"),
            &Blake3Hasher,
        )
        .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].key, Blake3Hasher.hash("Test1"));
        assert_eq!(chunks[1].key, Blake3Hasher.hash("Test2"));
        assert_ne!(chunks[0].key, chunks[1].key);
        assert_eq!(chunks[0].url, "/Test1/js/v1");
        assert_eq!(chunks[1].url, "/Test2/js/v1");
    }

    #[test]
    fn test_loose_budget_keeps_one_chunk() {
        let chunks = encode_urls(
            &bare(100),
            &idents(&["Test1.js", "Test2.js"]),
            AssetKind::Script,
            false,
            &EpochToken::new("1"),
            &Blake3Hasher,
        )
        .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].key, Blake3Hasher.hash("Test1/Test2"));
        assert_eq!(chunks[0].url, "/Test1/Test2/js/v1");
    }

    #[test]
    fn test_every_url_is_under_budget() {
        let max = 55;
        let identities = idents(&[
            "js/app.js",
            "js/vendor/jquery.js",
            "js/vendor/modernizr.js",
            "js/widgets/carousel.js",
            "js/site.js",
        ]);
        let config = RouteConfig {
            base_path: "combined".to_string(),
            max_url_length: max,
            keep_extensions: false,
        };
        let chunks = encode_urls(
            &config,
            &identities,
            AssetKind::Script,
            false,
            &EpochToken::new("20240601"),
            &Blake3Hasher,
        )
        .unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.url.len() < max,
                "{} is {} chars",
                chunk.url,
                chunk.url.len()
            );
        }
    }

    #[test]
    fn test_empty_identity_list() {
        let chunks = encode_urls(
            &bare(100),
            &[],
            AssetKind::Script,
            false,
            &EpochToken::new("1"),
            &Blake3Hasher,
        )
        .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_debug_marker_and_extension_mode() {
        let config = RouteConfig {
            base_path: "combined".to_string(),
            max_url_length: 2048,
            keep_extensions: true,
        };
        let chunks = encode_urls(
            &config,
            &idents(&["site.css"]),
            AssetKind::Style,
            true,
            &EpochToken::new("7"),
            &Blake3Hasher,
        )
        .unwrap();
        assert_eq!(chunks[0].url, "/combined/site/d7/css");
    }

    #[test]
    fn test_bundle_url() {
        let url = encode_bundle_url(
            &RouteConfig::default(),
            "site-core",
            AssetKind::Script,
            false,
            &EpochToken::new("3"),
        );
        assert_eq!(url, "/combined/site-core/js/v3");
    }
}
