//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the value types, the storage contract and the error
//! taxonomy shared by the generator, the storage backends and the service.

pub mod error;
pub mod owner;
pub mod repository;
pub mod shortener;
pub mod slug;

pub use error::{CoreError, ShortenerError, StorageError};
pub use owner::OwnerId;
pub use repository::{DeleteBatch, NewUrl, OwnedUrls, ReadRepository, Repository, UrlRecord};
pub use shortener::{BatchItem, BatchResult, SaveOutcome, Shortener};
pub use slug::Slug;
