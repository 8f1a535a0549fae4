//! Offline hub runtime: request classification, cache-or-network
//! resolution, sequential prefetch, and the service loop that ties
//! them together.

pub mod classify;
pub mod interceptor;
pub mod prefetch;
pub mod service;

pub use classify::{RangeSpec, RequestClass, ResourceRequest};
pub use interceptor::{HubResponse, Interceptor, ResponseSource};
pub use prefetch::{PrefetchReport, PrefetchTarget, Prefetcher, clear_all, collect_cacheable_resources};
pub use service::{InterceptorHandle, spawn};

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use dochub_client::fetch::{Fetch, FetchOptions, FetchedResource};
    use dochub_core::Error;

    #[derive(Clone)]
    struct CannedResponse {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    }

    /// In-memory stand-in for the network. Unregistered URLs and the
    /// offline flag both surface as fetch errors; a Range option is
    /// honored with a sliced 206 the way a real origin would.
    pub struct FakeFetcher {
        responses: Mutex<HashMap<String, CannedResponse>>,
        offline: AtomicBool,
        requests: Mutex<Vec<(String, FetchOptions)>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                offline: AtomicBool::new(false),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn insert(&self, url: &str, status: u16, content_type: Option<&str>, body: Vec<u8>) {
            self.responses.lock().unwrap().insert(
                url.to_string(),
                CannedResponse { status, content_type: content_type.map(str::to_string), body },
            );
        }

        pub fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        /// Options of the most recent request for `url`.
        pub fn last_options(&self, url: &str) -> Option<FetchOptions> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(u, _)| u == url)
                .map(|(_, opts)| opts.clone())
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests.lock().unwrap().iter().filter(|(u, _)| u == url).count()
        }
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn fetch(&self, url: &str, opts: FetchOptions) -> Result<FetchedResource, Error> {
            self.requests.lock().unwrap().push((url.to_string(), opts.clone()));

            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::HttpError(format!("{url}: connection refused")));
            }
            let canned = self
                .responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| Error::HttpError(format!("{url}: connection refused")))?;

            let (status, body, headers) = match opts.range.as_deref().and_then(parse_range) {
                Some((start, end)) if canned.status == 200 && (start as usize) < canned.body.len() => {
                    let end = end.min(canned.body.len() as u64 - 1);
                    let slice = canned.body[start as usize..=end as usize].to_vec();
                    let content_range = format!("bytes {start}-{end}/{}", canned.body.len());
                    (206, slice, vec![("content-range".to_string(), content_range)])
                }
                _ => (canned.status, canned.body, Vec::new()),
            };

            Ok(FetchedResource {
                url: url.to_string(),
                final_url: url.to_string(),
                status,
                content_type: canned.content_type,
                body: Bytes::from(body),
                headers,
                fetch_ms: 0,
            })
        }
    }

    fn parse_range(header: &str) -> Option<(u64, u64)> {
        let spec = header.strip_prefix("bytes=")?;
        let (start, end) = spec.split_once('-')?;
        Some((start.parse().ok()?, end.parse().unwrap_or(u64::MAX)))
    }
}
