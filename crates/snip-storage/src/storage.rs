use crate::{FileRepository, InMemoryRepository, PostgresRepository};
use async_trait::async_trait;
use snip_core::repository::{ReadRepository, Repository, Result};
use snip_core::{DeleteBatch, NewUrl, OwnedUrls, OwnerId, Slug};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use typed_builder::TypedBuilder;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where URL mappings are persisted.
///
/// Precedence: a database DSN wins over a file path, and with neither set
/// the store lives in memory.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct StorageConfig {
    #[builder(default)]
    pub database_dsn: Option<String>,
    #[builder(default)]
    pub file_path: Option<PathBuf>,
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    pub connect_timeout: Duration,
}

impl StorageConfig {
    /// The backend this configuration selects.
    pub fn kind(&self) -> StorageKind {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        if present(&self.database_dsn) {
            StorageKind::Postgres
        } else if self
            .file_path
            .as_ref()
            .is_some_and(|path| !path.as_os_str().is_empty())
        {
            StorageKind::File
        } else {
            StorageKind::Memory
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    File,
    Postgres,
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "in-memory"),
            StorageKind::File => write!(f, "file"),
            StorageKind::Postgres => write!(f, "postgres"),
        }
    }
}

/// The repository facade: exactly one backend, chosen at startup.
///
/// It only selects and prepares the backend; every call is forwarded
/// unchanged.
pub struct Storage {
    kind: StorageKind,
    backend: Box<dyn Repository>,
}

impl Storage {
    /// Builds the backend selected by `config`.
    ///
    /// The file backend replays its log and the relational backend connects,
    /// pings and migrates before this returns; any failure is fatal to startup.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let kind = config.kind();

        let backend: Box<dyn Repository> = match (kind, &config.database_dsn, &config.file_path) {
            (StorageKind::Postgres, Some(dsn), _) => {
                let repository = PostgresRepository::connect(dsn, config.connect_timeout).await?;
                repository.migrate().await?;
                Box::new(repository)
            }
            (StorageKind::File, _, Some(path)) => Box::new(FileRepository::open(path).await?),
            _ => Box::new(InMemoryRepository::new()),
        };

        info!(storage_backend = %kind, "storage initialised");
        Ok(Self { kind, backend })
    }

    /// Wraps an already constructed backend.
    pub fn from_backend(kind: StorageKind, backend: impl Repository) -> Self {
        Self {
            kind,
            backend: Box::new(backend),
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("kind", &self.kind).finish()
    }
}

#[async_trait]
impl ReadRepository for Storage {
    async fn resolve(&self, slug: &Slug) -> Result<String> {
        self.backend.resolve(slug).await
    }

    async fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug> {
        self.backend.reverse_resolve(owner, original_url).await
    }

    async fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls> {
        self.backend.list_owned(owner).await
    }

    async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }
}

#[async_trait]
impl Repository for Storage {
    async fn insert(&self, owner: OwnerId, slug: &Slug, original_url: &str) -> Result<()> {
        self.backend.insert(owner, slug, original_url).await
    }

    async fn insert_batch(&self, owner: OwnerId, entries: Vec<NewUrl>) -> Result<()> {
        self.backend.insert_batch(owner, entries).await
    }

    async fn soft_delete(&self, batch: DeleteBatch) -> Result<()> {
        self.backend.soft_delete(batch).await
    }
}
