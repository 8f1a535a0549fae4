//! Unified error types for dochub.
//!
//! Display strings follow a `CODE: detail` convention so failures stay
//! machine-greppable when they surface in logs or failure responses.

use tokio_rusqlite::rusqlite;

/// Unified error types for the dochub workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Catalog manifest could not be fetched or parsed.
    ///
    /// Callers recover by substituting the offline fallback catalog;
    /// this error never crashes the application.
    #[error("MANIFEST_UNAVAILABLE: {0}")]
    ManifestUnavailable(String),

    /// A single resource failed during prefetch. Recovered per-item:
    /// the batch skips the URL and continues.
    #[error("RESOURCE_FETCH_FAILED: {url}: {reason}")]
    ResourceFetchFailed { url: String, reason: String },

    /// A classified document request could not be satisfied from cache
    /// or network (or the network handed back the wrong content type).
    #[error("DOCUMENT_NOT_AVAILABLE: {0}")]
    DocumentNotAvailable(String),

    /// Requested byte range starts at or past the stored content length.
    #[error("RANGE_UNSATISFIABLE: start {start} outside content of {len} bytes")]
    RangeUnsatisfiable { start: u64, len: u64 },

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// HTTP error response or network failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch response exceeded the configured byte cap.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DocumentNotAvailable("https://docs.local/d/a.pdf".to_string());
        assert!(err.to_string().contains("DOCUMENT_NOT_AVAILABLE"));
        assert!(err.to_string().contains("a.pdf"));
    }

    #[test]
    fn test_resource_fetch_failed_display() {
        let err = Error::ResourceFetchFailed { url: "https://docs.local/x".into(), reason: "status 500".into() };
        let s = err.to_string();
        assert!(s.contains("RESOURCE_FETCH_FAILED"));
        assert!(s.contains("status 500"));
    }

    #[test]
    fn test_range_unsatisfiable_display() {
        let err = Error::RangeUnsatisfiable { start: 10, len: 5 };
        assert!(err.to_string().contains("RANGE_UNSATISFIABLE"));
        assert!(err.to_string().contains("start 10"));
    }
}
