//! URL shortener service implementation.
//!
//! [`UrlService`] validates URLs, allocates slugs with collision retry and
//! forwards deletions to a background [`deletion::DeletionAggregator`]. Core
//! types are re-exported from `snip_core`.

pub mod config;
pub mod deletion;
pub mod service;
pub mod validate;

pub use config::ServiceConfig;
pub use deletion::{DeletionAggregator, DeletionQueue};
pub use service::UrlService;
pub use validate::normalize_url;

pub use snip_core::{BatchItem, BatchResult, SaveOutcome, Shortener, ShortenerError};
