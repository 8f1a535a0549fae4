//! Catalog manifest loading and tag filtering.
//!
//! The catalog is the remote description of available documents:
//! a version token, tag metadata, and sections of document links.
//! It is fetched fresh on every load — never from an intermediate
//! cache — so its `version` field can serve as the freshness ground
//! truth for the whole offline set. On any failure the caller falls
//! back to an empty catalog and the application stays usable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fetch::{Fetch, FetchOptions};
use dochub_core::Error;

/// One document link in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Link target; the offline cache key once normalized. The original
    /// manifest schema calls this field `href`.
    #[serde(alias = "href")]
    pub url: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// A titled grouping of documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub items: Vec<DocumentRef>,
}

/// The remote catalog description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Opaque version token, compared for equality only.
    #[serde(default)]
    pub version: Option<String>,

    /// Display order of known tags.
    #[serde(default, rename = "tagMeta")]
    pub tag_meta: Vec<String>,

    #[serde(default)]
    pub sections: Vec<Section>,
}

/// The sentinel tag that matches everything.
pub const TAG_ALL: &str = "All";

fn tag_in(tags: &[String], wanted: &str) -> bool {
    tags.iter().any(|t| t.eq_ignore_ascii_case(wanted))
}

impl Section {
    /// Items visible under a tag filter: an item matches through its
    /// own tags or its section's tags.
    pub fn items_matching(&self, tag: &str) -> Vec<&DocumentRef> {
        self.items
            .iter()
            .filter(|item| tag == TAG_ALL || tag_in(&item.tags, tag) || tag_in(&self.tags, tag))
            .collect()
    }
}

impl Catalog {
    /// Every document link, in catalog order.
    pub fn document_refs(&self) -> impl Iterator<Item = &DocumentRef> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    /// The empty catalog substituted when the manifest is unavailable:
    /// zero items under a sentinel grouping, no version.
    pub fn offline_fallback() -> Self {
        Self {
            version: None,
            tag_meta: Vec::new(),
            sections: vec![Section { title: "Uncategorized".to_string(), tags: Vec::new(), items: Vec::new() }],
        }
    }
}

/// Fetches and parses the catalog manifest.
pub struct CatalogLoader {
    fetcher: Arc<dyn Fetch>,
}

impl CatalogLoader {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    /// Load the catalog, always bypassing intermediate caches.
    ///
    /// `cache_bust` is appended as a query token (mirroring the app
    /// build version) on top of the no-cache request headers.
    ///
    /// # Errors
    ///
    /// Returns `ManifestUnavailable` on network failure, a non-success
    /// status, or a malformed body. Callers substitute
    /// [`Catalog::offline_fallback`] rather than propagating a crash.
    pub async fn load(&self, manifest_url: &url::Url, cache_bust: &str) -> Result<Catalog, Error> {
        let mut busted = manifest_url.clone();
        if !cache_bust.is_empty() {
            busted.query_pairs_mut().append_pair("v", cache_bust);
        }

        let opts = FetchOptions { cache_bust: true, accept: Some("application/json".to_string()), range: None };

        let res = self
            .fetcher
            .fetch(busted.as_str(), opts)
            .await
            .map_err(|e| Error::ManifestUnavailable(e.to_string()))?;

        let catalog: Catalog = serde_json::from_slice(&res.body)
            .map_err(|e| Error::ManifestUnavailable(format!("malformed manifest: {}", e)))?;

        tracing::debug!(
            version = catalog.version.as_deref().unwrap_or("-"),
            sections = catalog.sections.len(),
            "catalog loaded"
        );

        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "version": "7",
        "tagMeta": ["EMER", "Ops"],
        "sections": [
            {
                "title": "Emergency",
                "tags": ["EMER"],
                "items": [
                    { "href": "d/emer.pdf", "label": "Emergency checklist", "tags": [] }
                ]
            },
            {
                "title": "Operations",
                "tags": ["Ops"],
                "items": [
                    { "url": "d/ops.pdf", "label": "Ops manual", "tags": ["Ops"] },
                    { "href": "d/misc.pdf", "label": "Misc notes" }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let catalog: Catalog = serde_json::from_str(MANIFEST).unwrap();
        assert_eq!(catalog.version.as_deref(), Some("7"));
        assert_eq!(catalog.tag_meta, vec!["EMER", "Ops"]);
        assert_eq!(catalog.sections.len(), 2);

        let urls: Vec<&str> = catalog.document_refs().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, vec!["d/emer.pdf", "d/ops.pdf", "d/misc.pdf"]);
    }

    #[test]
    fn test_href_and_url_spellings_both_accepted() {
        let catalog: Catalog = serde_json::from_str(MANIFEST).unwrap();
        let labels: Vec<&str> = catalog.document_refs().map(|d| d.label.as_str()).collect();
        assert!(labels.contains(&"Ops manual"));
        assert!(labels.contains(&"Emergency checklist"));
    }

    #[test]
    fn test_version_optional() {
        let catalog: Catalog = serde_json::from_str(r#"{"sections": []}"#).unwrap();
        assert!(catalog.version.is_none());
    }

    #[test]
    fn test_malformed_manifest_is_error() {
        let result: Result<Catalog, _> = serde_json::from_str("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_tag_filter_matches_item_or_section_tags() {
        let catalog: Catalog = serde_json::from_str(MANIFEST).unwrap();
        let emer = &catalog.sections[0];
        let ops = &catalog.sections[1];

        // Section tag carries items without their own tags.
        assert_eq!(emer.items_matching("emer").len(), 1);
        assert_eq!(ops.items_matching("EMER").len(), 0);
        assert_eq!(ops.items_matching("ops").len(), 2);
        assert_eq!(ops.items_matching(TAG_ALL).len(), 2);
    }

    #[test]
    fn test_offline_fallback_shape() {
        let catalog = Catalog::offline_fallback();
        assert!(catalog.version.is_none());
        assert_eq!(catalog.sections.len(), 1);
        assert_eq!(catalog.sections[0].title, "Uncategorized");
        assert_eq!(catalog.document_refs().count(), 0);
    }
}
