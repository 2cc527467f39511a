//! Asynchronous soft-delete pipeline.
//!
//! Callers push `{owner: slugs}` requests onto a bounded queue and return
//! immediately. A single background loop collects them and, on every tick of
//! the aggregation interval, merges everything received since the previous
//! tick into one [`DeleteBatch`] and hands it to [`Repository::soft_delete`].
//!
//! ```text
//! Idle --submit--> Collecting --tick--> Flushing --done--> Idle
//! ```
//!
//! Because one loop owns both the buffer and the flush, flushes never
//! overlap. Requests that arrive while a flush is running wait in the queue
//! and go out with the next tick.
//!
//! The loop buffers at most `capacity` requests between ticks and stops
//! receiving once that is reached, so a burst fills the channel and further
//! submitters wait until the next flush makes room.

use snip_core::{DeleteBatch, OwnerId, Repository, ShortenerError, Slug};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// One `submit_for_delete` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub owner: OwnerId,
    pub slugs: Vec<Slug>,
}

/// Sending half of the deletion pipeline.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    tx: mpsc::Sender<DeleteRequest>,
}

impl DeletionQueue {
    /// Enqueues a request. Only waits if the queue is at capacity.
    pub async fn submit(&self, owner: OwnerId, slugs: Vec<Slug>) -> Result<(), ShortenerError> {
        if slugs.is_empty() {
            return Ok(());
        }

        trace!(owner = %owner, count = slugs.len(), "queueing slugs for deletion");
        self.tx
            .send(DeleteRequest { owner, slugs })
            .await
            .map_err(|_| ShortenerError::DeletionQueueClosed)
    }
}

/// Requests received since the last flush, merged per owner.
#[derive(Debug, Default)]
struct PendingDeletes {
    batch: DeleteBatch,
    seen: HashSet<(OwnerId, Slug)>,
    requests: usize,
}

impl PendingDeletes {
    fn push(&mut self, request: DeleteRequest) {
        self.requests += 1;
        let slugs = self.batch.entry(request.owner).or_default();
        for slug in request.slugs {
            if self.seen.insert((request.owner, slug.clone())) {
                slugs.push(slug);
            }
        }
    }

    /// Requests merged since the last flush.
    fn requests(&self) -> usize {
        self.requests
    }

    fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    fn take(&mut self) -> DeleteBatch {
        self.seen.clear();
        self.requests = 0;
        std::mem::take(&mut self.batch)
    }
}

/// The background half of the deletion pipeline.
pub struct DeletionAggregator<R> {
    repository: Arc<R>,
    rx: mpsc::Receiver<DeleteRequest>,
    interval: Duration,
    capacity: usize,
    pending: PendingDeletes,
}

impl<R: Repository> DeletionAggregator<R> {
    /// Starts the aggregation loop on the current tokio runtime.
    ///
    /// The loop runs until every [`DeletionQueue`] clone is dropped, then
    /// flushes what is still pending and exits.
    pub fn spawn(
        repository: Arc<R>,
        interval: Duration,
        capacity: usize,
    ) -> (DeletionQueue, JoinHandle<()>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let aggregator = Self {
            repository,
            rx,
            interval,
            capacity,
            pending: PendingDeletes::default(),
        };

        let handle = tokio::spawn(aggregator.run());
        (DeletionQueue { tx }, handle)
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        debug!(interval_ms = self.interval.as_millis() as u64, "deletion aggregator started");

        loop {
            tokio::select! {
                request = self.rx.recv(), if self.pending.requests() < self.capacity => {
                    match request {
                        Some(request) => self.pending.push(request),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.drain_queued();
                    self.flush().await;
                }
            }
        }

        self.flush().await;
        info!("deletion aggregator stopped");
    }

    /// Moves requests already sitting in the queue into the pending buffer.
    ///
    /// The channel is bounded, so this takes at most `capacity` more.
    fn drain_queued(&mut self) {
        while let Ok(request) = self.rx.try_recv() {
            self.pending.push(request);
        }
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = self.pending.take();
        let owners = batch.len();
        let slugs: usize = batch.values().map(Vec::len).sum();

        match self.repository.soft_delete(batch).await {
            Ok(()) => debug!(owners, slugs, "flushed deletion batch"),
            Err(err) => error!(owners, slugs, error = %err, "failed to delete short urls"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use snip_core::repository::Result;
    use snip_core::{NewUrl, OwnedUrls, ReadRepository, StorageError};
    use snip_storage::InMemoryRepository;

    const INTERVAL: Duration = Duration::from_secs(2);

    /// Records every soft-delete batch, optionally taking a while to finish.
    #[derive(Default)]
    struct RecordingRepository {
        inner: InMemoryRepository,
        batches: Mutex<Vec<DeleteBatch>>,
        flush_delay: Option<Duration>,
    }

    impl RecordingRepository {
        fn batches(&self) -> Vec<DeleteBatch> {
            self.batches.lock().clone()
        }
    }

    #[async_trait]
    impl ReadRepository for RecordingRepository {
        async fn resolve(&self, slug: &Slug) -> Result<String> {
            self.inner.resolve(slug).await
        }

        async fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug> {
            self.inner.reverse_resolve(owner, original_url).await
        }

        async fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls> {
            self.inner.list_owned(owner).await
        }
    }

    #[async_trait]
    impl Repository for RecordingRepository {
        async fn insert(&self, owner: OwnerId, slug: &Slug, original_url: &str) -> Result<()> {
            self.inner.insert(owner, slug, original_url).await
        }

        async fn insert_batch(&self, owner: OwnerId, entries: Vec<NewUrl>) -> Result<()> {
            self.inner.insert_batch(owner, entries).await
        }

        async fn soft_delete(&self, batch: DeleteBatch) -> Result<()> {
            self.batches.lock().push(batch.clone());
            if let Some(delay) = self.flush_delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.soft_delete(batch).await
        }
    }

    fn slugs(values: &[&str]) -> Vec<Slug> {
        values.iter().map(|s| Slug::new_unchecked(*s)).collect()
    }

    fn slug_set(slugs: &[Slug]) -> HashSet<&str> {
        slugs.iter().map(Slug::as_str).collect()
    }

    #[test]
    fn pending_merges_per_owner_without_duplicates() {
        let owner = OwnerId::generate();
        let other = OwnerId::generate();
        let mut pending = PendingDeletes::default();

        pending.push(DeleteRequest { owner, slugs: slugs(&["a", "b"]) });
        pending.push(DeleteRequest { owner, slugs: slugs(&["b", "c"]) });
        pending.push(DeleteRequest { owner: other, slugs: slugs(&["z"]) });

        assert_eq!(pending.requests(), 3);
        let batch = pending.take();
        assert_eq!(batch[&owner], slugs(&["a", "b", "c"]));
        assert_eq!(batch[&other], slugs(&["z"]));
        assert!(pending.is_empty());
        assert_eq!(pending.requests(), 0);

        // a slug flushed earlier can be queued again
        pending.push(DeleteRequest { owner, slugs: slugs(&["a"]) });
        assert_eq!(pending.take()[&owner], slugs(&["a"]));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_makes_submitters_wait() {
        let repo = Arc::new(RecordingRepository::default());
        let owner = OwnerId::generate();
        let (queue, _handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 1);
        let wait = Duration::from_millis(50);

        // one request buffered by the loop, one sitting in the channel
        queue.submit(owner, slugs(&["a"])).await.unwrap();
        tokio::time::timeout(wait, queue.submit(owner, slugs(&["b"])))
            .await
            .expect("second request fits in the channel")
            .unwrap();

        let blocked = tokio::time::timeout(wait, queue.submit(owner, slugs(&["c"]))).await;
        assert!(blocked.is_err());
        assert!(repo.batches().is_empty());

        // the next tick flushes both and makes room again
        tokio::time::sleep(INTERVAL).await;
        let batches = repo.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(slug_set(&batches[0][&owner]), HashSet::from(["a", "b"]));

        tokio::time::timeout(wait, queue.submit(owner, slugs(&["c"])))
            .await
            .expect("room after flush")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn submissions_within_one_interval_become_one_call() {
        let repo = Arc::new(RecordingRepository::default());
        let owner = OwnerId::generate();
        let (queue, _handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 16);

        queue.submit(owner, slugs(&["aaa"])).await.unwrap();
        queue.submit(owner, slugs(&["bbb"])).await.unwrap();
        assert!(repo.batches().is_empty());

        tokio::time::sleep(INTERVAL + Duration::from_millis(100)).await;

        let batches = repo.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(slug_set(&batches[0][&owner]), HashSet::from(["aaa", "bbb"]));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_ticks_do_not_call_storage() {
        let repo = Arc::new(RecordingRepository::default());
        let (_queue, _handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 16);

        tokio::time::sleep(INTERVAL * 5).await;

        assert!(repo.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submissions_during_flush_go_to_next_tick() {
        let repo = Arc::new(RecordingRepository {
            flush_delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let owner = OwnerId::generate();
        let (queue, _handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 16);

        queue.submit(owner, slugs(&["first"])).await.unwrap();
        // land inside the first flush, which runs from 2.0s to 2.5s
        tokio::time::sleep(INTERVAL + Duration::from_millis(200)).await;
        assert_eq!(repo.batches().len(), 1);
        queue.submit(owner, slugs(&["second"])).await.unwrap();

        tokio::time::sleep(INTERVAL * 2).await;

        let batches = repo.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][&owner], slugs(&["first"]));
        assert_eq!(batches[1][&owner], slugs(&["second"]));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_queue_flushes_pending_requests() {
        let repo = Arc::new(RecordingRepository::default());
        let owner = OwnerId::generate();
        repo.insert(owner, &Slug::new_unchecked("bye"), "https://bye.example")
            .await
            .unwrap();
        let (queue, handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 16);

        queue.submit(owner, slugs(&["bye"])).await.unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(repo.batches().len(), 1);
        assert!(matches!(
            repo.resolve(&Slug::new_unchecked("bye")).await,
            Err(StorageError::Gone(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn storage_errors_do_not_stop_the_loop() {
        let repo = Arc::new(RecordingRepository::default());
        let owner = OwnerId::generate();
        let (queue, _handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 16);

        // unknown owner: soft_delete fails with InvalidOwner
        queue.submit(owner, slugs(&["nope"])).await.unwrap();
        tokio::time::sleep(INTERVAL + Duration::from_millis(100)).await;

        repo.insert(owner, &Slug::new_unchecked("real"), "https://real.example")
            .await
            .unwrap();
        queue.submit(owner, slugs(&["real"])).await.unwrap();
        tokio::time::sleep(INTERVAL).await;

        assert_eq!(repo.batches().len(), 2);
        assert!(matches!(
            repo.resolve(&Slug::new_unchecked("real")).await,
            Err(StorageError::Gone(_))
        ));
    }

    #[tokio::test]
    async fn empty_submission_is_ignored() {
        let repo = Arc::new(RecordingRepository::default());
        let (queue, handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 1);

        queue.submit(OwnerId::generate(), Vec::new()).await.unwrap();
        drop(queue);
        handle.await.unwrap();

        assert!(repo.batches().is_empty());
    }

    #[tokio::test]
    async fn closed_queue_reports_an_error() {
        let repo = Arc::new(RecordingRepository::default());
        let (queue, handle) = DeletionAggregator::spawn(Arc::clone(&repo), INTERVAL, 1);
        handle.abort();
        let _ = handle.await;

        let err = queue
            .submit(OwnerId::generate(), slugs(&["abc"]))
            .await
            .unwrap_err();
        assert_eq!(err, ShortenerError::DeletionQueueClosed);
    }
}
