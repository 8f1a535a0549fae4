//! Request interception: serve from storage or network per class.
//!
//! Strategies, by classification:
//!
//! - Navigation: network-first so updates deploy immediately; offline
//!   fallback to the stored entry page; explicit offline failure rather
//!   than a silent blank page.
//! - Document: cache-first. A document request is never satisfied by
//!   the entry-page fallback, and an HTML response is rejected as
//!   not-found wherever it came from — an SPA catch-all handing back
//!   the shell instead of the document is a wrong answer, not a hit.
//! - Ranged document: synthesized 206 from a fully stored body, or a
//!   network passthrough that is never cached (partial bodies must not
//!   occupy the key a future full fetch would use).
//! - Static asset: cache-first, stored on miss.
//! - Other (the catalog itself): network-first with cache-bust; cached
//!   copy only as a resilience fallback.
//!
//! Policy failures come back as explicit failure responses; only the
//! storage subsystem itself produces `Err`.

use std::sync::Arc;

use bytes::Bytes;

use crate::classify::{ClassifyRules, RangeSpec, RequestClass, ResourceRequest};
use dochub_client::fetch::{Fetch, FetchOptions, FetchedResource, normalize};
use dochub_core::{CacheDb, CacheRecord, Error, HubConfig, StoreKind};

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Straight from the record store.
    Cache,
    /// Fresh from the network.
    Network,
    /// Partial content sliced out of a stored body.
    Synthesized,
    /// Stored copy served because the network failed.
    Fallback,
    /// Explicit policy failure: offline with nothing stored, or an
    /// unsatisfiable range.
    Failure,
}

/// The interceptor's answer to one request.
#[derive(Debug, Clone)]
pub struct HubResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    /// Content-Range header value for partial responses.
    pub content_range: Option<String>,
    /// Whether the resource supports byte-range reads.
    pub accept_ranges: bool,
    pub source: ResponseSource,
}

impl HubResponse {
    fn from_record(record: CacheRecord, source: ResponseSource) -> Self {
        Self {
            status: 200,
            content_type: record.content_type,
            body: Bytes::from(record.body),
            content_range: None,
            accept_ranges: record.store == StoreKind::Document,
            source,
        }
    }

    fn from_network(res: FetchedResource) -> Self {
        let content_range = res
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-range"))
            .map(|(_, v)| v.clone());
        Self {
            status: res.status,
            content_type: res.content_type,
            body: res.body,
            content_range,
            accept_ranges: false,
            source: ResponseSource::Network,
        }
    }

    /// Slice a partial response out of a fully stored body.
    fn partial(record: &CacheRecord, start: u64, end: u64) -> Self {
        let total = record.body.len() as u64;
        let body = Bytes::copy_from_slice(&record.body[start as usize..=end as usize]);
        Self {
            status: 206,
            content_type: record.content_type.clone(),
            body,
            content_range: Some(format!("bytes {}-{}/{}", start, end, total)),
            accept_ranges: true,
            source: ResponseSource::Synthesized,
        }
    }

    /// An explicit failure response. Never HTML, so it can't be
    /// mistaken for a document or the app shell.
    fn failure(status: u16, message: String) -> Self {
        Self {
            status,
            content_type: Some("text/plain".to_string()),
            body: Bytes::from(message),
            content_range: None,
            accept_ranges: false,
            source: ResponseSource::Failure,
        }
    }

    /// Number of body bytes.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Resolves every resource request against cache and network.
///
/// Clone-cheap pieces only; the service layer runs resolutions
/// concurrently and storage access tolerates interleaving (last write
/// wins per record, no invariant spans multiple keys).
pub struct Interceptor {
    db: CacheDb,
    fetcher: Arc<dyn Fetch>,
    rules: ClassifyRules,
    entry_url: String,
    app_version: String,
}

impl Interceptor {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetch>, config: &HubConfig) -> Result<Self, Error> {
        let base = url::Url::parse(&config.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let entry_url = normalize(&config.entry_url, &base)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?
            .to_string();
        let rules = ClassifyRules::new(&config.document_extensions, &config.asset_extensions)?;

        Ok(Self { db, fetcher, rules, entry_url, app_version: config.app_version.clone() })
    }

    /// Activation: purge shell rows from previous builds, keeping the
    /// document store intact so a deploy never costs the offline set.
    pub async fn activate(&self) -> Result<u64, Error> {
        let purged = self.db.purge_stale_shell(&self.app_version).await?;
        if purged > 0 {
            tracing::info!(purged, app_version = %self.app_version, "purged shell records from previous build");
        }
        Ok(purged)
    }

    /// Resolve one request.
    pub async fn resolve(&self, req: &ResourceRequest) -> Result<HubResponse, Error> {
        match self.rules.classify(req) {
            RequestClass::Navigation => self.resolve_navigation(req).await,
            RequestClass::Document => self.resolve_document(req).await,
            RequestClass::RangedDocument => self.resolve_ranged_document(req).await,
            RequestClass::StaticAsset => self.resolve_static_asset(req).await,
            RequestClass::Other => self.resolve_other(req).await,
        }
    }

    async fn store(&self, url: &str, store: StoreKind, res: &FetchedResource) -> Result<(), Error> {
        let mut record = CacheRecord::new(
            url,
            store,
            &self.app_version,
            res.status as i32,
            res.content_type.clone(),
            res.body.to_vec(),
        );
        if let Some(headers) = res.headers_json() {
            record = record.with_headers_json(headers);
        }
        self.db.upsert_record(&record).await
    }

    /// Network-first; offline falls back to the stored entry page.
    async fn resolve_navigation(&self, req: &ResourceRequest) -> Result<HubResponse, Error> {
        match self.fetcher.fetch(&req.url, FetchOptions::default()).await {
            Ok(res) => {
                // Every navigation serves the entry page, so the
                // refresh lands under the entry-page key regardless of
                // the navigated path. The offline fallback reads the
                // same key.
                self.store(&self.entry_url, StoreKind::Shell, &res).await?;
                Ok(HubResponse::from_network(res))
            }
            Err(e) => {
                tracing::debug!(url = %req.url, error = %e, "navigation went offline, trying stored entry page");
                if let Some(record) = self.db.get_record(&self.entry_url).await? {
                    return Ok(HubResponse::from_record(record, ResponseSource::Fallback));
                }
                Ok(HubResponse::failure(503, "OFFLINE: entry page not cached".to_string()))
            }
        }
    }

    /// Cache-first; never HTML, never the entry-page fallback.
    async fn resolve_document(&self, req: &ResourceRequest) -> Result<HubResponse, Error> {
        if let Some(record) = self.db.get_record(&req.url).await? {
            if record.is_html() {
                tracing::warn!(url = %req.url, "cached record for document request is HTML, treating as miss");
            } else {
                return Ok(HubResponse::from_record(record, ResponseSource::Cache));
            }
        }

        match self.fetcher.fetch(&req.url, FetchOptions::fresh()).await {
            Ok(res) => {
                if res.is_html() {
                    // A nominally successful response carrying HTML is
                    // the wrong resource (catch-all route), not a hit.
                    return Ok(HubResponse::failure(503, Self::wrong_content(&req.url).to_string()));
                }
                self.store(&req.url, StoreKind::Document, &res).await?;
                Ok(HubResponse::from_network(res))
            }
            Err(e) => Ok(HubResponse::failure(503, Self::not_cached(&req.url, &e).to_string())),
        }
    }

    fn wrong_content(url: &str) -> Error {
        Error::DocumentNotAvailable(format!("{url} returned HTML instead of document content"))
    }

    fn not_cached(url: &str, cause: &Error) -> Error {
        Error::DocumentNotAvailable(format!("{url}: offline and not cached ({cause})"))
    }

    /// Synthesize from a stored body, or pass through without caching.
    async fn resolve_ranged_document(&self, req: &ResourceRequest) -> Result<HubResponse, Error> {
        let header = req.range.as_deref().unwrap_or_default();
        let Some(spec) = RangeSpec::parse(header) else {
            // Unusable Range header: per HTTP semantics, ignore it and
            // serve the whole resource.
            return self.resolve_document(req).await;
        };

        if let Some(record) = self.db.get_record(&req.url).await?
            && !record.is_html()
        {
            return match spec.resolve(record.body.len() as u64) {
                Ok((start, end)) => Ok(HubResponse::partial(&record, start, end)),
                Err(e) => Ok(HubResponse::failure(416, e.to_string())),
            };
        }

        // Not stored: forward the ranged request verbatim. The partial
        // body is not cached; only whole-resource fetches create
        // records.
        let opts = FetchOptions { range: Some(header.to_string()), ..FetchOptions::default() };
        match self.fetcher.fetch(&req.url, opts).await {
            Ok(res) => {
                if res.is_html() {
                    return Ok(HubResponse::failure(503, Self::wrong_content(&req.url).to_string()));
                }
                Ok(HubResponse::from_network(res))
            }
            Err(e) => Ok(HubResponse::failure(503, Self::not_cached(&req.url, &e).to_string())),
        }
    }

    /// Cache-first; a miss is fetched and stored for next time.
    async fn resolve_static_asset(&self, req: &ResourceRequest) -> Result<HubResponse, Error> {
        if let Some(record) = self.db.get_record(&req.url).await? {
            return Ok(HubResponse::from_record(record, ResponseSource::Cache));
        }

        match self.fetcher.fetch(&req.url, FetchOptions::default()).await {
            Ok(res) => {
                self.store(&req.url, StoreKind::Shell, &res).await?;
                Ok(HubResponse::from_network(res))
            }
            Err(e) => Ok(HubResponse::failure(503, format!("OFFLINE: {}: not cached ({})", req.url, e))),
        }
    }

    /// Network-first with cache-bust; the catalog must prefer the
    /// freshest remote copy whenever the network is reachable.
    async fn resolve_other(&self, req: &ResourceRequest) -> Result<HubResponse, Error> {
        match self.fetcher.fetch(&req.url, FetchOptions::fresh()).await {
            Ok(res) => {
                let is_json = res
                    .content_type
                    .as_deref()
                    .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
                    .unwrap_or(false);
                if is_json {
                    // Small text/json kept around for resiliency.
                    self.store(&req.url, StoreKind::Shell, &res).await?;
                }
                Ok(HubResponse::from_network(res))
            }
            Err(e) => {
                if let Some(record) = self.db.get_record(&req.url).await? {
                    return Ok(HubResponse::from_record(record, ResponseSource::Fallback));
                }
                Ok(HubResponse::failure(503, format!("OFFLINE: {}: not cached ({})", req.url, e)))
            }
        }
    }
}
