//! Persisted freshness scalars and the prefetch generation counter.
//!
//! `FreshnessState` is written as a pair: the timestamp and the catalog
//! version land in one transaction, never one without the other, so the
//! staleness policy is never asked to compare a time against a missing
//! version or vice versa.
//!
//! The generation counter guards against resurrection: a clear bumps it,
//! and a prefetch run that began under an older generation is refused
//! when it tries to record completion.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const KEY_LAST_PREFETCH_AT: &str = "hub.last_prefetch_at";
const KEY_LAST_PREFETCHED_VERSION: &str = "hub.last_prefetched_version";
const KEY_GENERATION: &str = "hub.generation";

/// Persisted record of the last successful prefetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessState {
    /// Epoch milliseconds of the last completed prefetch run.
    pub last_prefetch_at: i64,
    /// Catalog version the run was performed against. Absent when the
    /// catalog carried no version; never equal to any observed version.
    pub last_prefetched_version: Option<String>,
}

fn read_meta(conn: &rusqlite::Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    match conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0)) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_meta(conn: &rusqlite::Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

impl CacheDb {
    /// Read the freshness state.
    ///
    /// Returns None until the first successful prefetch, and again after
    /// a clear. A half-written pair is treated as absent.
    pub async fn get_freshness(&self) -> Result<Option<FreshnessState>, Error> {
        self.conn
            .call(|conn| -> Result<Option<FreshnessState>, Error> {
                let at = read_meta(conn, KEY_LAST_PREFETCH_AT)?;
                let version = read_meta(conn, KEY_LAST_PREFETCHED_VERSION)?;

                let Some(at) = at else { return Ok(None) };
                let at: i64 = at
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("corrupt {KEY_LAST_PREFETCH_AT}: {at}")))?;

                let last_prefetched_version = match version.as_deref() {
                    None | Some("") => None,
                    Some(v) => Some(v.to_string()),
                };

                Ok(Some(FreshnessState { last_prefetch_at: at, last_prefetched_version }))
            })
            .await
            .map_err(Error::from)
    }

    /// Record a completed prefetch, atomically writing both scalars.
    ///
    /// The write only lands if `expected_generation` still matches the
    /// stored generation; returns false (and writes nothing) when a
    /// clear happened while the run was in flight.
    pub async fn set_freshness(&self, at_ms: i64, version: Option<&str>, expected_generation: u64) -> Result<bool, Error> {
        let version = version.map(|v| v.to_string());
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;

                let current: u64 = read_meta(&tx, KEY_GENERATION)?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                if current != expected_generation {
                    return Ok(false);
                }

                write_meta(&tx, KEY_LAST_PREFETCH_AT, &at_ms.to_string())?;
                write_meta(&tx, KEY_LAST_PREFETCHED_VERSION, version.as_deref().unwrap_or(""))?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Current prefetch generation. Starts at 0; bumped by every clear.
    pub async fn generation(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let current: u64 = read_meta(conn, KEY_GENERATION)?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                Ok(current)
            })
            .await
            .map_err(Error::from)
    }

    /// Erase the freshness state and bump the generation, in one
    /// transaction. Idempotent: clearing an already-clear state only
    /// advances the generation.
    pub async fn clear_freshness(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                let tx = conn.transaction()?;

                let current: u64 = read_meta(&tx, KEY_GENERATION)?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);

                tx.execute(
                    "DELETE FROM meta WHERE key IN (?1, ?2)",
                    params![KEY_LAST_PREFETCH_AT, KEY_LAST_PREFETCHED_VERSION],
                )?;
                write_meta(&tx, KEY_GENERATION, &(current + 1).to_string())?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_freshness_absent_until_set() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_freshness().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_get_pair() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let wrote = db.set_freshness(1_700_000_000_000, Some("7"), 0).await.unwrap();
        assert!(wrote);

        let state = db.get_freshness().await.unwrap().unwrap();
        assert_eq!(state.last_prefetch_at, 1_700_000_000_000);
        assert_eq!(state.last_prefetched_version.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_missing_version_round_trips_as_none() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_freshness(1, None, 0).await.unwrap();
        let state = db.get_freshness().await.unwrap().unwrap();
        assert!(state.last_prefetched_version.is_none());
    }

    #[tokio::test]
    async fn test_stale_generation_refused() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let run_generation = db.generation().await.unwrap();

        // A clear lands while the prefetch run is mid-flight.
        db.clear_freshness().await.unwrap();

        let wrote = db.set_freshness(1, Some("7"), run_generation).await.unwrap();
        assert!(!wrote);
        assert!(db.get_freshness().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_freshness(1, Some("7"), 0).await.unwrap();

        db.clear_freshness().await.unwrap();
        db.clear_freshness().await.unwrap();

        assert!(db.get_freshness().await.unwrap().is_none());
        assert_eq!(db.generation().await.unwrap(), 2);
    }
}
