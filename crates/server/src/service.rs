//! Service loop around the interceptor.
//!
//! One task owns the [`Interceptor`]; callers talk to it through a
//! cloneable handle over an mpsc channel and get their answer on a
//! oneshot. Resolutions run in their own tasks so a slow document
//! fetch never blocks an unrelated asset request.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::classify::ResourceRequest;
use crate::interceptor::{HubResponse, Interceptor};
use dochub_core::Error;

enum ServiceCommand {
    Resolve {
        request: ResourceRequest,
        reply: oneshot::Sender<Result<HubResponse, Error>>,
    },
    Shutdown,
}

/// Cloneable handle to a running interceptor service.
#[derive(Clone)]
pub struct InterceptorHandle {
    tx: mpsc::Sender<ServiceCommand>,
}

impl InterceptorHandle {
    pub async fn resolve(&self, request: ResourceRequest) -> Result<HubResponse, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ServiceCommand::Resolve { request, reply })
            .await
            .map_err(|_| Error::InvalidInput("interceptor service stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::InvalidInput("interceptor service dropped the request".to_string()))?
    }

    /// Stop the service loop. In-flight resolutions finish on their own
    /// tasks; new resolves fail once the loop exits.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ServiceCommand::Shutdown).await;
    }
}

/// Start the interceptor service. Activation runs before the first
/// request is accepted, so stale shell records from a previous build
/// are gone by the time anything is served.
pub async fn spawn(interceptor: Interceptor) -> Result<InterceptorHandle, Error> {
    interceptor.activate().await?;

    let (tx, mut rx) = mpsc::channel::<ServiceCommand>(64);
    let interceptor = Arc::new(interceptor);

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                ServiceCommand::Resolve { request, reply } => {
                    let interceptor = Arc::clone(&interceptor);
                    tokio::spawn(async move {
                        let result = interceptor.resolve(&request).await;
                        // Caller may have given up; nothing to do then.
                        let _ = reply.send(result);
                    });
                }
                ServiceCommand::Shutdown => break,
            }
        }
        tracing::debug!("interceptor service loop exited");
    });

    Ok(InterceptorHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::ResponseSource;
    use crate::prefetch::clear_all;
    use crate::testutil::FakeFetcher;
    use dochub_core::{CacheDb, CacheRecord, HubConfig, StoreKind};

    #[tokio::test]
    async fn test_spawn_activates_and_serves() {
        let entry = "http://localhost:8000/index.html";
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.go_offline();
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = HubConfig::default();

        // Entry page from the current build, plus one from an old one.
        db.upsert_record(&CacheRecord::new(entry, StoreKind::Shell, "dev", 200, Some("text/html".into()), b"<html>app</html>".to_vec()))
            .await
            .unwrap();
        db.upsert_record(&CacheRecord::new("http://localhost:8000/old.js", StoreKind::Shell, "v0", 200, None, vec![1]))
            .await
            .unwrap();

        let interceptor = Interceptor::new(db.clone(), fetcher, &config).unwrap();
        let handle = spawn(interceptor).await.unwrap();

        assert!(db.get_record("http://localhost:8000/old.js").await.unwrap().is_none());

        let res = handle.resolve(ResourceRequest::navigation(entry)).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_ref(), b"<html>app</html>");
    }

    #[tokio::test]
    async fn test_handle_clones_share_service() {
        let asset = "http://localhost:8000/styles.css";
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.insert(asset, 200, Some("text/css"), b"body{}".to_vec());
        let db = CacheDb::open_in_memory().await.unwrap();
        let interceptor = Interceptor::new(db, fetcher, &HubConfig::default()).unwrap();

        let handle = spawn(interceptor).await.unwrap();
        let other = handle.clone();

        let a = handle.resolve(ResourceRequest::get(asset)).await.unwrap();
        let b = other.resolve(ResourceRequest::get(asset)).await.unwrap();
        assert_eq!(a.body, b.body);
    }

    #[tokio::test]
    async fn test_clear_while_service_running_then_shutdown() {
        // Clearing the cache under a live service leaves no served
        // state behind: shutting the service down afterwards is the
        // only remaining step to a fully clean stop.
        let doc = "http://localhost:8000/d/a.pdf";
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.go_offline();
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_record(&CacheRecord::new(doc, StoreKind::Document, "dev", 200, Some("application/pdf".into()), vec![1, 2]))
            .await
            .unwrap();
        assert!(db.set_freshness(1, Some("7"), 0).await.unwrap());

        let interceptor = Interceptor::new(db.clone(), fetcher, &HubConfig::default()).unwrap();
        let handle = spawn(interceptor).await.unwrap();

        let before = handle.resolve(ResourceRequest::get(doc)).await.unwrap();
        assert_eq!(before.status, 200);

        clear_all(&db).await.unwrap();

        let after = handle.resolve(ResourceRequest::get(doc)).await.unwrap();
        assert_eq!(after.status, 503);
        assert_eq!(after.source, ResponseSource::Failure);
        assert!(db.get_freshness().await.unwrap().is_none());

        handle.shutdown().await;
        while !handle.tx.is_closed() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_resolve_after_shutdown_fails() {
        let fetcher = Arc::new(FakeFetcher::new());
        let db = CacheDb::open_in_memory().await.unwrap();
        let interceptor = Interceptor::new(db, fetcher, &HubConfig::default()).unwrap();

        let handle = spawn(interceptor).await.unwrap();
        handle.shutdown().await;
        // Wait for the loop to exit and drop the receiver.
        while !handle.tx.is_closed() {
            tokio::task::yield_now().await;
        }

        let result = handle.resolve(ResourceRequest::get("http://localhost:8000/app.js")).await;
        assert!(result.is_err());
    }
}
