//! Tolerant request path parsing.
//!
//! Decoding never fails loudly: anything that does not match the
//! generated grammar is `None`, and the caller treats it as a plain
//! not-found. Requests are hostile input.

use percent_encoding::percent_decode_str;

use super::{RouteConfig, identity_from_name};
use crate::asset::AssetKind;
use crate::epoch::EpochToken;

/// A decoded request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Ordered name list (identity stems, or a single bundle name).
    pub names: Vec<String>,
    pub kind: AssetKind,
    pub debug: bool,
    pub epoch: EpochToken,
}

impl ParsedPath {
    /// Names restored to full identities (`app` -> `app.js`).
    pub fn identities(&self) -> Vec<String> {
        self.names
            .iter()
            .map(|n| identity_from_name(n, self.kind))
            .collect()
    }
}

/// Parse a request path produced by the encoder.
///
/// Expects `base_path` (when configured), at least one name segment
/// and the two tail segments in the order `keep_extensions` dictates.
/// Query string and fragment are ignored.
pub fn decode_path(config: &RouteConfig, path: &str) -> Option<ParsedPath> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let mut rest = path.trim_start_matches('/');

    if !config.base_path.is_empty() {
        rest = rest
            .strip_prefix(config.base_path.as_str())?
            .strip_prefix('/')?;
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return None;
    }

    let tail_a = segments[segments.len() - 2];
    let tail_b = segments[segments.len() - 1];
    let (epoch_segment, kind_segment) = if config.keep_extensions {
        (tail_a, tail_b)
    } else {
        (tail_b, tail_a)
    };

    let kind = AssetKind::from_token(kind_segment)?;
    let debug = match epoch_segment.as_bytes().first()? {
        b'v' => false,
        b'd' => true,
        _ => return None,
    };
    let epoch_text = &epoch_segment[1..];
    if epoch_text.is_empty()
        || !epoch_text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return None;
    }

    let names = segments[..segments.len() - 2]
        .iter()
        .map(|s| {
            percent_decode_str(s)
                .decode_utf8()
                .ok()
                .map(|n| n.into_owned())
        })
        .collect::<Option<Vec<_>>>()?;

    Some(ParsedPath {
        names,
        kind,
        debug,
        epoch: EpochToken::new(epoch_text),
    })
}
