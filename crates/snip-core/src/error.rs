use crate::owner::OwnerId;
use thiserror::Error;

/// Errors produced while constructing core value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("slug cannot be empty")]
    EmptySlug,
    #[error("invalid owner id: {0}")]
    InvalidOwnerId(String),
}

/// Errors returned by every storage backend.
///
/// The first group mirrors the repository contract and is shared by all
/// variants; the second group wraps infrastructure failures, which are
/// propagated to the caller and never retried by the backend itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("slug or url cannot be empty")]
    EmptyInput,
    #[error("url already exists: {0}")]
    UrlExists(String),
    #[error("slug already exists: {0}")]
    SlugExists(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("slug is deleted: {0}")]
    Gone(String),
    #[error("owner has no stored urls: {0}")]
    InvalidOwner(OwnerId),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("schema migration failed: {0}")]
    Migration(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors surfaced by the URL service to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortenerError {
    #[error("url cannot be empty")]
    EmptyUrl,
    #[error("invalid url format: {0}")]
    InvalidUrlFormat(String),
    #[error("url must use http or https scheme: {0}")]
    WrongScheme(String),
    #[error("url must include a host: {0}")]
    MissingHost(String),
    #[error("short url cannot be empty")]
    EmptyId,
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("short url is deleted: {0}")]
    Gone(String),
    #[error("url already exists: {0}")]
    UrlExists(String),
    #[error("failed to allocate a free slug after {attempts} attempts")]
    SlugSpaceExhausted { attempts: usize },
    #[error("slug generator failed: {0}")]
    Generator(String),
    #[error("deletion queue is closed")]
    DeletionQueueClosed,
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::EmptySlug => Self::EmptyId,
            other => Self::InvalidUrlFormat(other.to_string()),
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::Gone(slug) => Self::Gone(slug),
            StorageError::UrlExists(url) => Self::UrlExists(url),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_gone_stay_distinct() {
        let not_found = ShortenerError::from(StorageError::NotFound("abc".into()));
        let gone = ShortenerError::from(StorageError::Gone("abc".into()));

        assert!(matches!(not_found, ShortenerError::NotFound(_)));
        assert!(matches!(gone, ShortenerError::Gone(_)));
    }

    #[test]
    fn infrastructure_errors_are_wrapped() {
        let err = ShortenerError::from(StorageError::Timeout("pool".into()));
        assert_eq!(
            err,
            ShortenerError::Storage(StorageError::Timeout("pool".into()))
        );
    }

    #[test]
    fn io_error_converts_to_storage_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(StorageError::from(io), StorageError::Io(_)));
    }
}
