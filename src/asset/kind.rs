//! Asset kind definitions.

use serde::{Deserialize, Serialize};

use crate::utils::mime;

/// Kind of combinable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// JavaScript file.
    Script,
    /// Stylesheet.
    Style,
}

impl AssetKind {
    /// URL token identifying the kind inside generated paths.
    #[inline]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Script => "js",
            Self::Style => "css",
        }
    }

    /// Source file extension, without the dot.
    #[inline]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Script => "js",
            Self::Style => "css",
        }
    }

    /// Content type of an uncompressed combined artifact.
    #[inline]
    pub fn mime(self) -> &'static str {
        mime::from_extension(self.extension())
    }

    /// Text inserted between combined streams.
    ///
    /// Scripts get an explicit `;` so concatenation cannot merge two
    /// statements across file boundaries.
    #[inline]
    pub const fn delimiter(self) -> &'static str {
        match self {
            Self::Script => ";\n",
            Self::Style => "\n",
        }
    }

    /// Kind for a URL token, if recognized.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "js" => Some(Self::Script),
            "css" => Some(Self::Style),
            _ => None,
        }
    }

    /// Kind implied by an identity's extension.
    pub fn from_identity(identity: &str) -> Option<Self> {
        match crate::utils::path::extension(identity)? {
            "js" | "mjs" => Some(Self::Script),
            "css" => Some(Self::Style),
            _ => None,
        }
    }
}
