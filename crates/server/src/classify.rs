//! Request classification.
//!
//! Every intercepted request is sorted into exactly one class, which
//! picks the resolution strategy. Classification is an explicit ordered
//! rule list rather than nested conditionals so precedence is auditable
//! and testable in isolation from fetch mechanics. Order matters:
//! document detection runs before navigation, because a click on a
//! document link may arrive as a navigation and must still open the
//! document, never the app shell.

use dochub_core::Error;
use regex::Regex;

/// One outgoing resource request, as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// Normalized absolute URL.
    pub url: String,
    /// True for a top-level navigation (loading the entry page).
    pub navigate: bool,
    /// Accept header, if any.
    pub accept: Option<String>,
    /// Raw Range header value, if any.
    pub range: Option<String>,
}

impl ResourceRequest {
    /// A plain subresource GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into(), navigate: false, accept: None, range: None }
    }

    /// A top-level navigation.
    pub fn navigation(url: impl Into<String>) -> Self {
        Self { url: url.into(), navigate: true, accept: Some("text/html".to_string()), range: None }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

/// Resolution strategy classes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Byte-range read of a large binary document.
    RangedDocument,
    /// Whole-resource read of a large binary document.
    Document,
    /// Loading the application entry page.
    Navigation,
    /// Script, style, markup, icon, app manifest.
    StaticAsset,
    /// Everything else (catalog manifest, API calls).
    Other,
}

/// Accept-header values that mark a request as wanting binary document
/// content even when the URL alone doesn't say so.
const DOCUMENT_ACCEPT_HINTS: &[&str] = &["application/pdf", "application/octet-stream"];

/// Compiled classification rules.
///
/// The same logical document is linked in several syntactic forms, so
/// extension matching also covers trailing query/fragment decorations
/// (`a.pdf?v=2`, `?file=a.pdf`) via a compiled pattern.
#[derive(Debug)]
pub struct ClassifyRules {
    document_re: Regex,
    asset_extensions: Vec<String>,
}

type Rule = fn(&ClassifyRules, &ResourceRequest) -> Option<RequestClass>;

/// Ordered rule table; the first rule that claims a request wins.
const RULES: &[(&str, Rule)] = &[
    ("ranged-document", ClassifyRules::rule_ranged_document),
    ("document", ClassifyRules::rule_document),
    ("navigation", ClassifyRules::rule_navigation),
    ("static-asset", ClassifyRules::rule_static_asset),
];

impl ClassifyRules {
    pub fn new(document_extensions: &[String], asset_extensions: &[String]) -> Result<Self, Error> {
        if document_extensions.is_empty() {
            return Err(Error::InvalidInput("document_extensions cannot be empty".into()));
        }

        // ".pdf" anywhere in the URL as long as it terminates a path or
        // query component: end of string, '?', '#', '&', or '='.
        let alternatives: Vec<String> = document_extensions.iter().map(|ext| regex::escape(ext)).collect();
        let pattern = format!("(?:{})(?:$|[?#&=])", alternatives.join("|"));
        let document_re = Regex::new(&pattern).map_err(|e| Error::InvalidInput(format!("bad extension pattern: {}", e)))?;

        Ok(Self { document_re, asset_extensions: asset_extensions.to_vec() })
    }

    /// Classify one request. Total: falls through to `Other`.
    pub fn classify(&self, req: &ResourceRequest) -> RequestClass {
        for (name, rule) in RULES {
            if let Some(class) = rule(self, req) {
                tracing::trace!(rule = name, url = %req.url, "request classified");
                return class;
            }
        }
        RequestClass::Other
    }

    /// Document detection: extension (with trailing decorations) or a
    /// content-negotiation hint.
    fn is_document(&self, req: &ResourceRequest) -> bool {
        if self.document_re.is_match(&req.url.to_ascii_lowercase()) {
            return true;
        }
        if let Some(accept) = &req.accept {
            let accept = accept.to_ascii_lowercase();
            if DOCUMENT_ACCEPT_HINTS.iter().any(|hint| accept.contains(hint)) {
                return true;
            }
        }
        false
    }

    fn rule_ranged_document(&self, req: &ResourceRequest) -> Option<RequestClass> {
        (self.is_document(req) && req.range.is_some()).then_some(RequestClass::RangedDocument)
    }

    fn rule_document(&self, req: &ResourceRequest) -> Option<RequestClass> {
        self.is_document(req).then_some(RequestClass::Document)
    }

    fn rule_navigation(&self, req: &ResourceRequest) -> Option<RequestClass> {
        req.navigate.then_some(RequestClass::Navigation)
    }

    fn rule_static_asset(&self, req: &ResourceRequest) -> Option<RequestClass> {
        let path = match url::Url::parse(&req.url) {
            Ok(u) => u.path().to_ascii_lowercase(),
            Err(_) => req.url.to_ascii_lowercase(),
        };
        self.asset_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
            .then_some(RequestClass::StaticAsset)
    }
}

/// A parsed byte-range request: `bytes=a-b`, `bytes=a-`, or `bytes=-n`.
///
/// Multi-range headers are not supported and parse as None; per HTTP
/// semantics an unusable Range header is ignored and the full resource
/// served instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl RangeSpec {
    /// Parse a Range header value.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }

        let (start_s, end_s) = spec.split_once('-')?;
        let start = if start_s.is_empty() { None } else { Some(start_s.trim().parse().ok()?) };
        let end = if end_s.is_empty() { None } else { Some(end_s.trim().parse().ok()?) };

        if start.is_none() && end.is_none() {
            return None;
        }
        if let (Some(s), Some(e)) = (start, end)
            && s > e
        {
            return None;
        }

        Some(Self { start, end })
    }

    /// Resolve against a stored content length, clamping where the
    /// clamp is unambiguous (an end past the last byte). A start at or
    /// past the end of content has no sensible clamp and is an error.
    ///
    /// Returns the inclusive `(start, end)` byte offsets.
    pub fn resolve(&self, len: u64) -> Result<(u64, u64), Error> {
        match (self.start, self.end) {
            // Suffix form: last n bytes.
            (None, Some(n)) => {
                if n == 0 || len == 0 {
                    return Err(Error::RangeUnsatisfiable { start: len, len });
                }
                Ok((len.saturating_sub(n), len - 1))
            }
            (Some(start), end) => {
                if start >= len {
                    return Err(Error::RangeUnsatisfiable { start, len });
                }
                let end = end.map_or(len - 1, |e| e.min(len - 1));
                Ok((start, end))
            }
            (None, None) => Err(Error::RangeUnsatisfiable { start: 0, len }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ClassifyRules {
        ClassifyRules::new(
            &[".pdf".to_string()],
            &[".js", ".css", ".html", ".webmanifest", ".png", ".svg", ".ico"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_classify_document_by_extension() {
        let r = rules();
        assert_eq!(r.classify(&ResourceRequest::get("https://docs.local/d/a.pdf")), RequestClass::Document);
        assert_eq!(r.classify(&ResourceRequest::get("https://docs.local/d/A.PDF")), RequestClass::Document);
    }

    #[test]
    fn test_classify_document_trailing_forms() {
        let r = rules();
        assert_eq!(r.classify(&ResourceRequest::get("https://docs.local/d/a.pdf?v=2")), RequestClass::Document);
        assert_eq!(
            r.classify(&ResourceRequest::get("https://docs.local/viewer?file=d/a.pdf&page=3")),
            RequestClass::Document
        );
    }

    #[test]
    fn test_classify_document_by_accept_hint() {
        let r = rules();
        let req = ResourceRequest::get("https://docs.local/d/download").with_accept("application/pdf");
        assert_eq!(r.classify(&req), RequestClass::Document);
    }

    #[test]
    fn test_document_wins_over_navigation() {
        // A click on a document link arrives as a navigation; it must
        // open the document, never the app shell.
        let r = rules();
        let req = ResourceRequest::navigation("https://docs.local/d/a.pdf");
        assert_eq!(r.classify(&req), RequestClass::Document);
    }

    #[test]
    fn test_ranged_document_wins_over_document() {
        let r = rules();
        let req = ResourceRequest::get("https://docs.local/d/a.pdf").with_range("bytes=0-1023");
        assert_eq!(r.classify(&req), RequestClass::RangedDocument);
    }

    #[test]
    fn test_range_on_non_document_does_not_promote() {
        let r = rules();
        let req = ResourceRequest::get("https://docs.local/app.js").with_range("bytes=0-10");
        assert_eq!(r.classify(&req), RequestClass::StaticAsset);
    }

    #[test]
    fn test_classify_navigation() {
        let r = rules();
        assert_eq!(r.classify(&ResourceRequest::navigation("https://docs.local/")), RequestClass::Navigation);
    }

    #[test]
    fn test_classify_static_asset() {
        let r = rules();
        assert_eq!(r.classify(&ResourceRequest::get("https://docs.local/app.js")), RequestClass::StaticAsset);
        assert_eq!(r.classify(&ResourceRequest::get("https://docs.local/app.webmanifest")), RequestClass::StaticAsset);
        // Query string must not defeat asset detection by extension.
        assert_eq!(r.classify(&ResourceRequest::get("https://docs.local/app.js?v=7")), RequestClass::StaticAsset);
    }

    #[test]
    fn test_classify_other() {
        let r = rules();
        assert_eq!(
            r.classify(&ResourceRequest::get("https://docs.local/docs/manifest.json?v=7")),
            RequestClass::Other
        );
    }

    #[test]
    fn test_range_parse_forms() {
        assert_eq!(RangeSpec::parse("bytes=0-1023"), Some(RangeSpec { start: Some(0), end: Some(1023) }));
        assert_eq!(RangeSpec::parse("bytes=100-"), Some(RangeSpec { start: Some(100), end: None }));
        assert_eq!(RangeSpec::parse("bytes=-500"), Some(RangeSpec { start: None, end: Some(500) }));
    }

    #[test]
    fn test_range_parse_rejects_garbage() {
        assert_eq!(RangeSpec::parse("bytes=-"), None);
        assert_eq!(RangeSpec::parse("bytes=5-2"), None);
        assert_eq!(RangeSpec::parse("bytes=0-10,20-30"), None);
        assert_eq!(RangeSpec::parse("items=0-10"), None);
        assert_eq!(RangeSpec::parse("bytes=abc-def"), None);
    }

    #[test]
    fn test_range_resolve_clamps_end() {
        let spec = RangeSpec::parse("bytes=10-9999").unwrap();
        assert_eq!(spec.resolve(100).unwrap(), (10, 99));
    }

    #[test]
    fn test_range_resolve_open_end() {
        let spec = RangeSpec::parse("bytes=90-").unwrap();
        assert_eq!(spec.resolve(100).unwrap(), (90, 99));
    }

    #[test]
    fn test_range_resolve_suffix() {
        let spec = RangeSpec::parse("bytes=-10").unwrap();
        assert_eq!(spec.resolve(100).unwrap(), (90, 99));
        // Suffix longer than the content means the whole content.
        let spec = RangeSpec::parse("bytes=-500").unwrap();
        assert_eq!(spec.resolve(100).unwrap(), (0, 99));
    }

    #[test]
    fn test_range_resolve_start_past_end_unsatisfiable() {
        let spec = RangeSpec::parse("bytes=100-").unwrap();
        assert!(matches!(spec.resolve(100), Err(Error::RangeUnsatisfiable { .. })));
        let spec = RangeSpec::parse("bytes=0-10").unwrap();
        assert!(matches!(spec.resolve(0), Err(Error::RangeUnsatisfiable { .. })));
    }
}
