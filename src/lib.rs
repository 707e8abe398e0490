//! Sheaf - a composite asset build-and-cache engine.
//!
//! Turns named or ad-hoc collections of scripts and stylesheets into
//! minified, combined, compressed, cacheable artifacts addressed by
//! self-describing URLs. The host's routing layer stays in charge of
//! HTTP; sheaf covers everything between "these files belong together"
//! and "here are the bytes for that request path":
//!
//! ```text
//! request path -> decode -> coordinator -> [per-file cache/pipeline]
//!              -> combine -> compress -> persisted artifact -> bytes
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sheaf::{Bundle, CompressionKind, Engine, EngineConfig, FsSource};
//!
//! fn main() -> sheaf::Result<()> {
//!     let config = EngineConfig::default();
//!     let engine = Engine::new(config, Arc::new(FsSource::new("assets")));
//!
//!     engine.register(Bundle::script("core").add("js/app.js").add("js/nav.js"))?;
//!
//!     // Render time: emit the URL the page embeds.
//!     let urls = engine.bundle_urls("core", false)?;
//!
//!     // Request time: answer that URL with built bytes.
//!     if let Some(output) = engine.handle_request(&urls[0], CompressionKind::Gzip)? {
//!         let _ = (output.bytes, output.mime, output.encoding);
//!     }
//!     Ok(())
//! }
//! ```

// Asset model, bundles and their registry.
pub mod asset;
pub mod bundle;

// URL codec: asset lists to request paths and back.
pub mod route;

// Per-file pipeline and the stores everything lands in.
pub mod cache;
pub mod pipeline;

// Build orchestration and the host-facing facade.
pub mod build;
pub mod engine;

// Combination, compression, epochs, sources.
pub mod combine;
pub mod compress;
pub mod epoch;
pub mod source;

// Ambient concerns.
pub mod error;
pub mod logger;
pub mod options;
pub mod utils;
pub mod watch;

pub use asset::{Asset, AssetKind, Convention};
pub use build::BuildOutput;
pub use bundle::{Bundle, BundleOptions};
pub use compress::CompressionKind;
pub use engine::Engine;
pub use epoch::{EpochProvider, EpochStrategy, EpochToken};
pub use error::{EngineError, Result};
pub use options::{BuildOptions, CacheControl, EngineConfig};
pub use pipeline::{BuildContext, Next, Pipeline, ProcessingContext, Stage, StageId};
pub use source::{FsSource, MemorySource, SourceProvider};
pub use utils::hash::{Blake3Hasher, IdentityHasher};
