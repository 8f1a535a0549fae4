//! Cache record CRUD operations.
//!
//! One record per normalized URL: the response bytes plus the header
//! metadata the interceptor needs to answer later requests, including
//! the total byte length used to synthesize partial responses.

use super::connection::CacheDb;
use super::key::record_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Which logical store a record belongs to.
///
/// Shell rows are tagged with the app build version and purged on
/// activation when the build changes; document rows survive deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Shell,
    Document,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Shell => "shell",
            StoreKind::Document => "document",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "document" => StoreKind::Document,
            _ => StoreKind::Shell,
        }
    }
}

/// A stored copy of one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub url: String,
    pub store: StoreKind,
    pub app_version: String,
    pub status_code: i32,
    pub content_type: Option<String>,
    pub total_len: i64,
    pub body: Vec<u8>,
    pub headers_json: Option<String>,
    pub fetched_at: String,
}

impl CacheRecord {
    /// Build a record from a fetched response body.
    ///
    /// `url` must already be normalized; it doubles as the storage key.
    pub fn new(url: &str, store: StoreKind, app_version: &str, status_code: i32, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            key: record_key(url),
            url: url.to_string(),
            store,
            app_version: app_version.to_string(),
            status_code,
            content_type,
            total_len: body.len() as i64,
            body,
            headers_json: None,
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Attach the verbatim response headers as a JSON object.
    pub fn with_headers_json(mut self, headers_json: String) -> Self {
        self.headers_json = Some(headers_json);
        self
    }

    /// True when the stored content type indicates HTML.
    ///
    /// A document request must never be answered with HTML content,
    /// whatever route it arrived by.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

impl CacheDb {
    /// Insert or update a record.
    ///
    /// Uses UPSERT semantics: last write wins on concurrent stores of
    /// the same URL.
    pub async fn upsert_record(&self, record: &CacheRecord) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO records (
                        key, url, store, app_version, status_code,
                        content_type, total_len, body, headers_json, fetched_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(key) DO UPDATE SET
                        url = excluded.url,
                        store = excluded.store,
                        app_version = excluded.app_version,
                        status_code = excluded.status_code,
                        content_type = excluded.content_type,
                        total_len = excluded.total_len,
                        body = excluded.body,
                        headers_json = excluded.headers_json,
                        fetched_at = excluded.fetched_at",
                    params![
                        &record.key,
                        &record.url,
                        record.store.as_str(),
                        &record.app_version,
                        record.status_code,
                        &record.content_type,
                        record.total_len,
                        &record.body,
                        &record.headers_json,
                        &record.fetched_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a record by its normalized URL.
    ///
    /// Returns None on a cache miss.
    pub async fn get_record(&self, url: &str) -> Result<Option<CacheRecord>, Error> {
        let key = record_key(url);
        self.conn
            .call(move |conn| -> Result<Option<CacheRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, url, store, app_version, status_code,
                            content_type, total_len, body, headers_json, fetched_at
                     FROM records WHERE key = ?1",
                )?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(CacheRecord {
                        key: row.get(0)?,
                        url: row.get(1)?,
                        store: StoreKind::from_str(&row.get::<_, String>(2)?),
                        app_version: row.get(3)?,
                        status_code: row.get(4)?,
                        content_type: row.get(5)?,
                        total_len: row.get(6)?,
                        body: row.get(7)?,
                        headers_json: row.get(8)?,
                        fetched_at: row.get(9)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Count records in one store.
    pub async fn count_records(&self, store: StoreKind) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM records WHERE store = ?1",
                    params![store.as_str()],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every record in both stores.
    ///
    /// Returns the number of deleted rows. Safe to call repeatedly.
    pub async fn delete_all_records(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM records", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Activation purge: drop shell rows tagged with an older build
    /// version. Document rows always survive a deploy.
    ///
    /// Returns the number of deleted rows.
    pub async fn purge_stale_shell(&self, current_version: &str) -> Result<u64, Error> {
        let current = current_version.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM records WHERE store = 'shell' AND app_version != ?1",
                    params![current],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
