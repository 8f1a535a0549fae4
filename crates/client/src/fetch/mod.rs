//! HTTP fetch pipeline.
//!
//! ### Cache bypass
//! Prefetch and catalog loads always ask origin servers for a fresh
//! copy (`Cache-Control: no-cache`), so stored records and the catalog
//! version can be trusted as ground truth.
//!
//! ### Range passthrough
//! A byte-range request is forwarded with its `Range` header verbatim;
//! 206 responses are returned as-is and never cached here.
//!
//! ### Limits
//! - Request timeout and redirect cap from `FetchConfig`
//! - Max body bytes enforced against both Content-Length and the body

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, normalize};

use dochub_core::Error;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "dochub/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 50MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "dochub/0.1".to_string(),
            max_bytes: 50 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Ask intermediaries for a fresh copy instead of a cached one.
    pub cache_bust: bool,

    /// Optional Accept header.
    pub accept: Option<String>,

    /// Optional Range header value (e.g., "bytes=0-1023"), forwarded
    /// verbatim.
    pub range: Option<String>,
}

impl FetchOptions {
    /// Options for a cache-bypassing whole-resource fetch.
    pub fn fresh() -> Self {
        Self { cache_bust: true, ..Self::default() }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// The URL requested
    pub url: String,
    /// The final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub body: Bytes,
    /// Response headers as (name, value) pairs
    pub headers: Vec<(String, String)>,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchedResource {
    /// True when the response content type indicates HTML.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    /// Response headers serialized as a JSON object for storage.
    pub fn headers_json(&self) -> Option<String> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::to_string(&map).ok()
    }
}

/// Network seam for everything that fetches.
///
/// The prefetcher, catalog loader, and interceptor all go through this
/// trait, so tests run against an in-memory fake network.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` with the given options.
    ///
    /// Non-success statuses are errors, except 206 for ranged requests.
    async fn fetch(&self, url: &str, opts: FetchOptions) -> Result<FetchedResource, Error>;
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Fetch for FetchClient {
    async fn fetch(&self, url: &str, opts: FetchOptions) -> Result<FetchedResource, Error> {
        let start = Instant::now();

        let mut request = self.http.get(url);

        if opts.cache_bust {
            request = request
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }
        if let Some(accept) = &opts.accept {
            request = request.header(header::ACCEPT, accept);
        }
        if let Some(range) = &opts.range {
            request = request.header(header::RANGE, range);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("network error: {}", e)))?;

        let status = response.status();
        let ranged = opts.range.is_some();

        if !status.is_success() && !(ranged && status.as_u16() == 206) {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let status = status.as_u16();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                body.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, body.len());

        Ok(FetchedResource { url: url.to_string(), final_url, status, content_type, body, headers, fetch_ms })
    }
}
