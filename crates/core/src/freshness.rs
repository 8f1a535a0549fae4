//! Staleness policy for the offline document set.
//!
//! A pure function of the persisted freshness state and the catalog
//! version currently in hand; recomputed on every load and after every
//! prefetch. Three triggers, any one sufficient:
//!
//! - no prior successful prefetch
//! - the last prefetch is older than the configured maximum age
//! - the catalog version changed since the last prefetch (versions are
//!   opaque tokens compared for equality only; a missing recorded
//!   version never equals any catalog version)

use crate::cache::FreshnessState;
use chrono::{DateTime, Utc};

/// Decide whether the offline set should be refreshed.
pub fn is_stale(state: Option<&FreshnessState>, catalog_version: &str, max_age_ms: i64, now: DateTime<Utc>) -> bool {
    let Some(state) = state else { return true };

    let age_ms = now.timestamp_millis() - state.last_prefetch_at;
    if age_ms > max_age_ms {
        return true;
    }

    match state.last_prefetched_version.as_deref() {
        Some(recorded) => recorded != catalog_version,
        None => true,
    }
}
