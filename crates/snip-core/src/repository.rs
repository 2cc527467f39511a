use crate::error::StorageError;
use crate::owner::OwnerId;
use crate::slug::Slug;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Live URLs of one owner, keyed by slug.
pub type OwnedUrls = BTreeMap<Slug, String>;

/// Slugs to soft-delete, grouped by the owner that requested it.
pub type DeleteBatch = HashMap<OwnerId, Vec<Slug>>;

/// A stored URL record.
///
/// Serialized field names match the on-disk line format of the file backend
/// (`uuid`, `owner_uuid`, `short_url`, `original_url`, `is_deleted`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Immutable record identifier.
    #[serde(rename = "uuid")]
    pub id: Uuid,
    /// The owner the URL was shortened for.
    #[serde(rename = "owner_uuid")]
    pub owner: OwnerId,
    #[serde(rename = "short_url")]
    pub slug: Slug,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Soft-delete flag; only ever flips from `false` to `true`.
    #[serde(rename = "is_deleted", default)]
    pub deleted: bool,
}

impl UrlRecord {
    pub fn new(owner: OwnerId, slug: Slug, original_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            slug,
            original_url: original_url.into(),
            deleted: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// One pre-validated entry of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrl {
    pub slug: Slug,
    pub original_url: String,
}

impl NewUrl {
    pub fn new(slug: Slug, original_url: impl Into<String>) -> Self {
        Self {
            slug,
            original_url: original_url.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.slug.is_blank() || self.original_url.trim().is_empty()
    }
}

/// Rejects blank slugs or URLs with [`StorageError::EmptyInput`].
///
/// Shared by every backend so the emptiness rule is identical everywhere.
pub fn ensure_not_blank(entry: &NewUrl) -> Result<()> {
    if entry.is_blank() {
        return Err(StorageError::EmptyInput);
    }
    Ok(())
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Resolves a slug to its original URL.
    ///
    /// Returns `Err(NotFound)` for unknown slugs and `Err(Gone)` for slugs
    /// whose record has been soft-deleted.
    async fn resolve(&self, slug: &Slug) -> Result<String>;

    /// Finds the live slug an owner already uses for `original_url`.
    async fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug>;

    /// Lists every live URL of an owner.
    ///
    /// Returns `Err(NotFound)` if the owner has no live records.
    async fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls>;

    /// Checks that the backend can serve requests.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// The full storage contract implemented by every backend.
///
/// Original-URL uniqueness is scoped per owner on every backend. Slugs are
/// never reused, including slugs of soft-deleted records.
#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new mapping.
    ///
    /// Fails with `EmptyInput` on blank input, `UrlExists` if the owner already
    /// has a live record for the URL (checked first), and `SlugExists` if the
    /// slug is taken.
    async fn insert(&self, owner: OwnerId, slug: &Slug, original_url: &str) -> Result<()>;

    /// Inserts many mappings for one owner, with the same per-item rejection
    /// rules as [`Repository::insert`].
    ///
    /// Atomicity differs per backend: the relational backend commits all
    /// entries or none, while the memory and file backends apply entries in
    /// order and leave those before the first failure in place.
    async fn insert_batch(&self, owner: OwnerId, entries: Vec<NewUrl>) -> Result<()>;

    /// Marks slugs as deleted, but only those owned by the requesting owner.
    ///
    /// Unknown or foreign slugs are skipped silently. Owners with no records
    /// at all are reported as `InvalidOwner` after the other owners in the
    /// batch have been applied.
    async fn soft_delete(&self, batch: DeleteBatch) -> Result<()>;
}

#[async_trait]
impl<T: ReadRepository + ?Sized> ReadRepository for Arc<T> {
    async fn resolve(&self, slug: &Slug) -> Result<String> {
        (**self).resolve(slug).await
    }

    async fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug> {
        (**self).reverse_resolve(owner, original_url).await
    }

    async fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls> {
        (**self).list_owned(owner).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn insert(&self, owner: OwnerId, slug: &Slug, original_url: &str) -> Result<()> {
        (**self).insert(owner, slug, original_url).await
    }

    async fn insert_batch(&self, owner: OwnerId, entries: Vec<NewUrl>) -> Result<()> {
        (**self).insert_batch(owner, entries).await
    }

    async fn soft_delete(&self, batch: DeleteBatch) -> Result<()> {
        (**self).soft_delete(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_line_uses_file_field_names() {
        let owner: OwnerId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        let record = UrlRecord::new(owner, Slug::new_unchecked("abcdefgh"), "https://a.example");

        let line = serde_json::to_value(&record).unwrap();
        assert_eq!(line["owner_uuid"], "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(line["short_url"], "abcdefgh");
        assert_eq!(line["original_url"], "https://a.example");
        assert_eq!(line["is_deleted"], false);
        assert!(line["uuid"].is_string());
    }

    #[test]
    fn missing_deleted_flag_defaults_to_live() {
        let line = r#"{"uuid":"0b7d1c3e-2a7e-4f43-9c3c-5f1d8b8f2a11","owner_uuid":"67e55044-10b1-426f-9247-bb680e5fe0c8","short_url":"abc","original_url":"https://a.example"}"#;
        let record: UrlRecord = serde_json::from_str(line).unwrap();
        assert!(record.is_live());
    }

    #[test]
    fn blank_entries_are_rejected() {
        let blank_url = NewUrl::new(Slug::new_unchecked("abc"), "  ");
        let blank_slug = NewUrl::new(Slug::new_unchecked(""), "https://a.example");

        assert_eq!(ensure_not_blank(&blank_url), Err(StorageError::EmptyInput));
        assert_eq!(ensure_not_blank(&blank_slug), Err(StorageError::EmptyInput));
    }
}
