//! URL normalization for consistent cache keys.
//!
//! The catalog links the same logical document in several syntactic
//! forms (relative, absolute, fragment-decorated). All of them must
//! normalize to one absolute URL before being used as a storage key,
//! or the cache grows duplicate rows for one resource.

/// Error type for URL normalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Normalize a URL reference to its absolute form.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references against `base`
/// 3. Require http/https
/// 4. Remove the fragment (#...)
/// 5. Keep the query string intact (do not reorder)
///
/// Host case folding is handled by the parser.
pub fn normalize(input: &str, base: &url::Url) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    resolved.set_fragment(None);

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> url::Url {
        url::Url::parse("https://docs.local/app/").unwrap()
    }

    #[test]
    fn test_normalize_relative() {
        let url = normalize("d/a.pdf", &base()).unwrap();
        assert_eq!(url.as_str(), "https://docs.local/app/d/a.pdf");
    }

    #[test]
    fn test_normalize_root_relative() {
        let url = normalize("/d/a.pdf", &base()).unwrap();
        assert_eq!(url.as_str(), "https://docs.local/d/a.pdf");
    }

    #[test]
    fn test_relative_and_absolute_forms_agree() {
        let rel = normalize("d/a.pdf", &base()).unwrap();
        let abs = normalize("https://docs.local/app/d/a.pdf", &base()).unwrap();
        assert_eq!(rel, abs);
    }

    #[test]
    fn test_normalize_lowercases_host() {
        let url = normalize("https://DOCS.LOCAL/d/a.pdf", &base()).unwrap();
        assert_eq!(url.host_str(), Some("docs.local"));
    }

    #[test]
    fn test_normalize_strips_fragment_keeps_query() {
        let url = normalize("d/a.pdf?v=2#page=3", &base()).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("v=2"));
    }

    #[test]
    fn test_normalize_dot_segments() {
        let url = normalize("./d/../d/a.pdf", &base()).unwrap();
        assert_eq!(url.path(), "/app/d/a.pdf");
    }

    #[test]
    fn test_normalize_empty() {
        assert!(matches!(normalize("", &base()), Err(UrlError::Empty)));
        assert!(matches!(normalize("   ", &base()), Err(UrlError::Empty)));
    }

    #[test]
    fn test_normalize_unsupported_scheme() {
        let result = normalize("file:///etc/passwd", &base());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }
}
