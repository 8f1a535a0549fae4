//! Offline prefetch: walk the catalog, fetch every cacheable resource
//! one at a time, and record completion so freshness can be judged.

use std::sync::Arc;

use chrono::Utc;

use dochub_client::catalog::Catalog;
use dochub_client::fetch::{Fetch, FetchOptions, normalize};
use dochub_core::{CacheDb, CacheRecord, Error, HubConfig, StoreKind};

/// One URL the prefetcher should pull down, with the store its record
/// belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchTarget {
    pub url: String,
    pub store: StoreKind,
}

/// Every resource a full prefetch covers: the configured shell set
/// first, then each catalog document, normalized and deduplicated
/// while keeping first-seen order.
pub fn collect_cacheable_resources(config: &HubConfig, catalog: &Catalog) -> Result<Vec<PrefetchTarget>, Error> {
    let base = url::Url::parse(&config.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut seen = std::collections::HashSet::new();
    let mut targets = Vec::new();

    let mut push = |raw: &str, store: StoreKind, targets: &mut Vec<PrefetchTarget>| {
        match normalize(raw, &base) {
            Ok(url) => {
                let url = url.to_string();
                if seen.insert(url.clone()) {
                    targets.push(PrefetchTarget { url, store });
                }
            }
            Err(e) => {
                tracing::warn!(url = raw, error = %e, "skipping unusable url in prefetch set");
            }
        }
    };

    for shell_url in &config.shell_urls {
        push(shell_url, StoreKind::Shell, &mut targets);
    }
    for doc in catalog.document_refs() {
        push(&doc.url, StoreKind::Document, &mut targets);
    }

    Ok(targets)
}

/// Outcome of one prefetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Clear-generation observed before fetching started; completion
    /// is only recorded if it still matches.
    pub generation: u64,
}

impl PrefetchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Sequential prefetch driver.
///
/// Resources are fetched strictly one at a time. The target set covers
/// documents the user asked to keep offline, and hammering a small
/// origin with a burst of concurrent downloads buys little over a
/// predictable, reportable sequence.
pub struct Prefetcher {
    db: CacheDb,
    fetcher: Arc<dyn Fetch>,
    app_version: String,
}

impl Prefetcher {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetch>, config: &HubConfig) -> Self {
        Self { db, fetcher, app_version: config.app_version.clone() }
    }

    /// Fetch and store each target in order, reporting `(done, total)`
    /// after every attempt. A failed target is logged and skipped; the
    /// run continues.
    pub async fn run<F>(&self, targets: &[PrefetchTarget], mut on_progress: F) -> Result<PrefetchReport, Error>
    where
        F: FnMut(usize, usize),
    {
        let generation = self.db.generation().await?;
        let total = targets.len();
        let mut succeeded = 0;
        let mut failed = 0;

        for (i, target) in targets.iter().enumerate() {
            match self.fetch_one(target).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(url = %target.url, error = %e, "prefetch item failed, continuing");
                }
            }
            on_progress(i + 1, total);
        }

        tracing::info!(total, succeeded, failed, "prefetch run finished");
        Ok(PrefetchReport { total, succeeded, failed, generation })
    }

    async fn fetch_one(&self, target: &PrefetchTarget) -> Result<(), Error> {
        let res = self.fetcher.fetch(&target.url, FetchOptions::fresh()).await?;
        if !(200..300).contains(&res.status) {
            return Err(Error::ResourceFetchFailed {
                url: target.url.clone(),
                reason: format!("status {}", res.status),
            });
        }
        if target.store == StoreKind::Document && res.is_html() {
            return Err(Error::ResourceFetchFailed {
                url: target.url.clone(),
                reason: "server returned HTML instead of document content".to_string(),
            });
        }

        let mut record = CacheRecord::new(
            &target.url,
            target.store,
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

    /// Record when the run finished and which catalog version it
    /// covered. Returns false (and records nothing) when a clear ran
    /// mid-flight, so a wiped cache is not reported fresh.
    pub async fn record_completion(&self, report: &PrefetchReport, catalog_version: Option<&str>) -> Result<bool, Error> {
        let recorded = self
            .db
            .set_freshness(Utc::now().timestamp_millis(), catalog_version, report.generation)
            .await?;
        if !recorded {
            tracing::warn!("cache cleared during prefetch, completion not recorded");
        }
        Ok(recorded)
    }
}

/// Remove every stored record and all freshness bookkeeping. Safe to
/// call twice; the second call is a no-op apart from another
/// generation bump.
pub async fn clear_all(db: &CacheDb) -> Result<u64, Error> {
    let removed = db.delete_all_records().await?;
    db.clear_freshness().await?;
    tracing::info!(removed, "cleared offline cache");
    Ok(removed)
}
