//! MIME type constants for served artifacts.

/// Common MIME type constants.
pub mod types {
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const GZIP: &str = "application/gzip";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// MIME type for a source extension (`js`, `css`).
pub fn from_extension(ext: &str) -> &'static str {
    match ext {
        "js" | "mjs" => types::JAVASCRIPT,
        "css" => types::CSS,
        "gz" => types::GZIP,
        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(from_extension("js"), types::JAVASCRIPT);
        assert_eq!(from_extension("css"), types::CSS);
        assert_eq!(from_extension("bin"), types::OCTET_STREAM);
    }
}
