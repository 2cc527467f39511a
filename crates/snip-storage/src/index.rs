//! Entity store shared by the in-memory and file backends.
//!
//! Every record is held exactly once, in insertion order. The lookup maps
//! only hold positions into `records` and are maintained exclusively by the
//! methods below, so a partial update can never leave them out of step.

use snip_core::repository::{ensure_not_blank, Result};
use snip_core::{DeleteBatch, NewUrl, OwnedUrls, OwnerId, Slug, StorageError, UrlRecord};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub(crate) struct UrlIndex {
    records: Vec<UrlRecord>,
    by_id: HashMap<Uuid, usize>,
    /// Every slug ever assigned, live or deleted. Slugs are never reused.
    by_slug: HashMap<Slug, usize>,
    /// Live records only.
    by_owner_url: HashMap<(OwnerId, String), usize>,
    by_owner: HashMap<OwnerId, Vec<usize>>,
}

/// What a soft-delete pass actually did.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DeleteReport {
    pub marked: usize,
    pub unknown_owners: Vec<OwnerId>,
}

impl DeleteReport {
    pub fn into_result(self) -> Result<()> {
        match self.unknown_owners.first() {
            Some(owner) => Err(StorageError::InvalidOwner(*owner)),
            None => Ok(()),
        }
    }
}

impl UrlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[UrlRecord] {
        &self.records
    }

    pub fn resolve(&self, slug: &Slug) -> Result<String> {
        let Some(&pos) = self.by_slug.get(slug) else {
            return Err(StorageError::NotFound(slug.to_string()));
        };

        let record = &self.records[pos];
        if record.deleted {
            return Err(StorageError::Gone(slug.to_string()));
        }
        Ok(record.original_url.clone())
    }

    pub fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug> {
        self.by_owner_url
            .get(&(owner, original_url.to_owned()))
            .map(|&pos| self.records[pos].slug.clone())
            .ok_or_else(|| StorageError::NotFound(original_url.to_owned()))
    }

    pub fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls> {
        let urls: OwnedUrls = self
            .by_owner
            .get(&owner)
            .into_iter()
            .flatten()
            .map(|&pos| &self.records[pos])
            .filter(|record| record.is_live())
            .map(|record| (record.slug.clone(), record.original_url.clone()))
            .collect();

        if urls.is_empty() {
            return Err(StorageError::NotFound(owner.to_string()));
        }
        Ok(urls)
    }

    /// Validates a new entry against the current state and builds its record
    /// without storing it.
    pub fn prepare(&self, owner: OwnerId, entry: NewUrl) -> Result<UrlRecord> {
        ensure_not_blank(&entry)?;

        if self
            .by_owner_url
            .contains_key(&(owner, entry.original_url.clone()))
        {
            return Err(StorageError::UrlExists(entry.original_url));
        }
        if self.by_slug.contains_key(&entry.slug) {
            return Err(StorageError::SlugExists(entry.slug.into_inner()));
        }

        Ok(UrlRecord::new(owner, entry.slug, entry.original_url))
    }

    /// Stores a record produced by [`UrlIndex::prepare`].
    pub fn commit(&mut self, record: UrlRecord) {
        let pos = self.records.len();
        self.by_id.insert(record.id, pos);
        self.by_slug.insert(record.slug.clone(), pos);
        if record.is_live() {
            self.by_owner_url
                .insert((record.owner, record.original_url.clone()), pos);
        }
        self.by_owner.entry(record.owner).or_default().push(pos);
        self.records.push(record);
    }

    pub fn insert(&mut self, owner: OwnerId, entry: NewUrl) -> Result<()> {
        let record = self.prepare(owner, entry)?;
        self.commit(record);
        Ok(())
    }

    /// Re-applies a record read back from durable storage.
    ///
    /// A record whose id is already known may only move from live to
    /// deleted; anything else contradicting the current state is rejected
    /// with `InvalidData` and leaves the index untouched.
    pub fn restore(&mut self, record: UrlRecord) -> Result<()> {
        if let Some(&pos) = self.by_id.get(&record.id) {
            let current = &self.records[pos];
            if current.slug != record.slug
                || current.owner != record.owner
                || current.original_url != record.original_url
            {
                return Err(StorageError::InvalidData(format!(
                    "record {} changed identity on replay",
                    record.id
                )));
            }
            if record.deleted {
                self.mark_deleted(pos);
            }
            return Ok(());
        }

        if self.by_slug.contains_key(&record.slug) {
            return Err(StorageError::InvalidData(format!(
                "slug '{}' assigned to more than one record",
                record.slug
            )));
        }
        if record.is_live()
            && self
                .by_owner_url
                .contains_key(&(record.owner, record.original_url.clone()))
        {
            return Err(StorageError::InvalidData(format!(
                "url '{}' stored twice for owner {}",
                record.original_url, record.owner
            )));
        }

        self.commit(record);
        Ok(())
    }

    pub fn soft_delete(&mut self, batch: DeleteBatch) -> DeleteReport {
        let mut report = DeleteReport::default();

        for (owner, slugs) in batch {
            if !self.by_owner.contains_key(&owner) {
                report.unknown_owners.push(owner);
                continue;
            }

            for slug in slugs {
                let Some(&pos) = self.by_slug.get(&slug) else {
                    continue;
                };
                let record = &self.records[pos];
                if record.owner != owner || record.deleted {
                    continue;
                }
                self.mark_deleted(pos);
                report.marked += 1;
            }
        }

        report
    }

    fn mark_deleted(&mut self, pos: usize) {
        let record = &mut self.records[pos];
        if record.deleted {
            return;
        }
        record.deleted = true;

        let key = (record.owner, record.original_url.clone());
        if self.by_owner_url.get(&key) == Some(&pos) {
            self.by_owner_url.remove(&key);
        }
    }
}
