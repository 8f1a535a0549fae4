//! Core types and shared functionality for dochub.
//!
//! This crate provides:
//! - Offline cache implementation with SQLite backend
//! - Freshness/staleness policy
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;

pub use cache::{CacheDb, CacheRecord, FreshnessState, StoreKind};
pub use config::HubConfig;
pub use error::Error;
