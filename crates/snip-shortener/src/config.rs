use std::time::Duration;
use typed_builder::TypedBuilder;

/// Slug collisions tolerated per request before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
/// How often pending delete requests are flushed to storage.
pub const DEFAULT_DELETE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_DELETE_QUEUE_CAPACITY: usize = 1024;

/// Tunables of the URL service.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    /// Total insert attempts per URL when the generated slug is taken.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
    /// Aggregation interval of the deletion pipeline.
    #[builder(default = DEFAULT_DELETE_INTERVAL)]
    pub delete_interval: Duration,
    /// Capacity of the bounded deletion queue; submitters wait when it is full.
    #[builder(default = DEFAULT_DELETE_QUEUE_CAPACITY)]
    pub delete_queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServiceConfig {
    /// `max_attempts`, never below one.
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }
}
