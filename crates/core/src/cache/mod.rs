//! SQLite-backed offline cache for catalog resources.
//!
//! This module provides the persistent store behind the offline cache
//! manager and the request interceptor. It supports:
//!
//! - Byte-content records keyed by a SHA-256 hash of the normalized URL
//! - Separate logical stores for shell assets and documents
//! - Build-version tagging so a deploy can purge obsolete shell rows
//!   without losing the user's offline document set
//! - Freshness scalars with a generation counter guarding late writes
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod key;
pub mod meta;
pub mod migrations;
pub mod records;

pub use crate::Error;

pub use connection::CacheDb;
pub use meta::FreshnessState;
pub use records::{CacheRecord, StoreKind};
