use crate::owner::OwnerId;
use crate::repository::OwnedUrls;
use crate::slug::Slug;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Outcome of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new mapping was stored under this slug.
    Created(Slug),
    /// The owner had already shortened this URL; the existing slug is returned
    /// so callers can answer idempotently (HTTP 409 in a web adapter).
    AlreadyExists(Slug),
}

impl SaveOutcome {
    pub fn slug(&self) -> &Slug {
        match self {
            SaveOutcome::Created(slug) | SaveOutcome::AlreadyExists(slug) => slug,
        }
    }

    pub fn into_slug(self) -> Slug {
        match self {
            SaveOutcome::Created(slug) | SaveOutcome::AlreadyExists(slug) => slug,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SaveOutcome::Created(_))
    }
}

/// One URL of a batch request, tagged with a caller-chosen correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// The slug assigned to one [`BatchItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub slug: Slug,
}

/// The inbound contract consumed by transport adapters.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens a URL for an owner.
    async fn save_url(&self, owner: OwnerId, raw_url: &str) -> Result<SaveOutcome>;

    /// Shortens many URLs at once; one invalid item rejects the whole batch.
    async fn save_batch(&self, owner: OwnerId, items: Vec<BatchItem>) -> Result<Vec<BatchResult>>;

    /// Resolves a slug to its original URL.
    async fn get_url(&self, owner: OwnerId, slug: &str) -> Result<String>;

    /// Lists the live URLs of an owner.
    async fn get_user_urls(&self, owner: OwnerId) -> Result<OwnedUrls>;

    /// Queues slugs for asynchronous soft deletion and returns without waiting
    /// for the storage write.
    async fn submit_for_delete(&self, owner: OwnerId, slugs: Vec<Slug>) -> Result<()>;
}
