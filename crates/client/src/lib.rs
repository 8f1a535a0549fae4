//! Client code for dochub.
//!
//! This crate provides the HTTP fetch pipeline, URL normalization, and
//! the catalog loader shared by the hub service and the CLI.

pub mod catalog;
pub mod fetch;

pub use catalog::{Catalog, CatalogLoader, DocumentRef, Section, TAG_ALL};
pub use fetch::{Fetch, FetchClient, FetchConfig, FetchOptions, FetchedResource, normalize};
