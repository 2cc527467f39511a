use crate::config::ServiceConfig;
use crate::deletion::{DeletionAggregator, DeletionQueue};
use crate::validate::normalize_url;
use async_trait::async_trait;
use snip_core::{
    BatchItem, BatchResult, NewUrl, OwnedUrls, OwnerId, Repository, SaveOutcome, Shortener,
    ShortenerError, Slug, StorageError,
};
use snip_generator::Generator;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Generator` to handle:
/// - URL validation and normalization
/// - Slug generation, retrying on collisions up to `max_attempts`
/// - Ownership-scoped lookups
/// - Asynchronous soft deletion through a [`DeletionAggregator`]
pub struct UrlService<R, G> {
    repository: Arc<R>,
    generator: G,
    config: ServiceConfig,
    deletions: DeletionQueue,
    aggregator: JoinHandle<()>,
}

impl<R: Repository, G: Generator> UrlService<R, G> {
    /// Creates the service and starts its deletion aggregator.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(repository: R, generator: G, config: ServiceConfig) -> Self {
        let repository = Arc::new(repository);
        let (deletions, aggregator) = DeletionAggregator::spawn(
            Arc::clone(&repository),
            config.delete_interval,
            config.delete_queue_capacity,
        );

        Self {
            repository,
            generator,
            config,
            deletions,
            aggregator,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Checks that the storage backend is reachable.
    pub async fn ping(&self) -> Result<(), ShortenerError> {
        Ok(self.repository.ping().await?)
    }

    /// Closes the deletion queue and waits until every pending request has
    /// been flushed to storage.
    pub async fn shutdown(self) {
        drop(self.deletions);
        if let Err(err) = self.aggregator.await {
            error!(error = %err, "deletion aggregator terminated abnormally");
        }
        info!("url service stopped");
    }

    fn next_slug(&self) -> Result<Slug, ShortenerError> {
        self.generator
            .generate()
            .map_err(|err| ShortenerError::Generator(err.to_string()))
    }

    /// Generates one slug per item, distinct within the batch.
    fn batch_slugs(&self, count: usize) -> Result<Vec<Slug>, ShortenerError> {
        let attempts = self.config.attempts();
        let mut seen = HashSet::with_capacity(count);
        let mut slugs = Vec::with_capacity(count);

        for _ in 0..count {
            let mut fresh = None;
            for _ in 0..attempts {
                let slug = self.next_slug()?;
                if seen.insert(slug.clone()) {
                    fresh = Some(slug);
                    break;
                }
            }
            slugs.push(fresh.ok_or(ShortenerError::SlugSpaceExhausted { attempts })?);
        }

        Ok(slugs)
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for UrlService<R, G> {
    #[instrument(skip(self, owner), fields(owner = %owner))]
    async fn save_url(&self, owner: OwnerId, raw_url: &str) -> Result<SaveOutcome, ShortenerError> {
        let url = normalize_url(raw_url)?;
        let attempts = self.config.attempts();

        for attempt in 1..=attempts {
            let slug = self.next_slug()?;
            match self.repository.insert(owner, &slug, &url).await {
                Ok(()) => {
                    debug!(slug = %slug, attempt, "stored short url");
                    return Ok(SaveOutcome::Created(slug));
                }
                Err(StorageError::SlugExists(_)) => {
                    debug!(slug = %slug, attempt, "slug collision, regenerating");
                }
                Err(StorageError::UrlExists(_)) => {
                    let existing = self.repository.reverse_resolve(owner, &url).await?;
                    debug!(slug = %existing, "url already shortened by owner");
                    return Ok(SaveOutcome::AlreadyExists(existing));
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(attempts, "no free slug found");
        Err(ShortenerError::SlugSpaceExhausted { attempts })
    }

    #[instrument(skip(self, owner, items), fields(owner = %owner, count = items.len()))]
    async fn save_batch(
        &self,
        owner: OwnerId,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>, ShortenerError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let urls = items
            .iter()
            .map(|item| normalize_url(&item.original_url))
            .collect::<Result<Vec<_>, _>>()?;
        let slugs = self.batch_slugs(items.len())?;

        let entries = slugs
            .iter()
            .zip(urls)
            .map(|(slug, url)| NewUrl::new(slug.clone(), url))
            .collect();
        self.repository.insert_batch(owner, entries).await?;

        debug!("stored short url batch");
        Ok(items
            .into_iter()
            .zip(slugs)
            .map(|(item, slug)| BatchResult {
                correlation_id: item.correlation_id,
                slug,
            })
            .collect())
    }

    async fn get_url(&self, _owner: OwnerId, slug: &str) -> Result<String, ShortenerError> {
        let slug = Slug::new(slug)?;
        Ok(self.repository.resolve(&slug).await?)
    }

    async fn get_user_urls(&self, owner: OwnerId) -> Result<OwnedUrls, ShortenerError> {
        Ok(self.repository.list_owned(owner).await?)
    }

    async fn submit_for_delete(
        &self,
        owner: OwnerId,
        slugs: Vec<Slug>,
    ) -> Result<(), ShortenerError> {
        self.deletions.submit(owner, slugs).await
    }
}
