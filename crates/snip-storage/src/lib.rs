//! Storage backends for the snip URL shortener.
//!
//! Three interchangeable implementations of [`Repository`]: in memory, an
//! append-only JSON-lines file, and PostgreSQL. [`Storage`] picks one of
//! them from a [`StorageConfig`] at startup.

mod index;

pub mod file;
pub mod memory;
pub mod postgres;
pub mod storage;

pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use storage::{Storage, StorageConfig, StorageKind};

pub use snip_core::{ReadRepository, Repository, StorageError};
