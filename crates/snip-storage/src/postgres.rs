use async_trait::async_trait;
use snip_core::repository::{ensure_not_blank, ReadRepository, Repository, Result};
use snip_core::{DeleteBatch, NewUrl, OwnedUrls, OwnerId, Slug, StorageError};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Unique constraint on `short_url`.
const SLUG_CONSTRAINT: &str = "urls_short_url_key";
/// Partial unique index on `(owner_uuid, original_url)` over live rows.
const OWNER_URL_CONSTRAINT: &str = "urls_owner_original_url_live_key";

const MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL implementation of the repository contract.
///
/// Soft delete is implemented with `is_deleted`. Slugs stay unique across
/// deleted rows, so a deleted slug keeps resolving to `Gone`. Batch inserts
/// run in one transaction and commit all rows or none.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and pings the server.
    ///
    /// Connection establishment is bounded by `connect_timeout`; failures are
    /// returned rather than retried.
    pub async fn connect(database_url: &str, connect_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.ping().await?;
        Ok(repository)
    }

    /// Applies every pending migration in version order.
    ///
    /// Running against a fully migrated schema is a no-op.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        info!("database migrations applied");
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    err.as_database_error().and_then(|db| db.constraint())
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        sqlx::Error::Migrate(_) => StorageError::Migration(message),
        _ => StorageError::Query(message),
    }
}

/// Translates a failed insert into the contract's conflict errors.
fn map_insert_error(err: sqlx::Error, entry: &NewUrl) -> StorageError {
    if !is_unique_violation(&err) {
        return map_sqlx_error(err);
    }

    let constraint = violated_constraint(&err).map(str::to_owned);
    match constraint.as_deref() {
        Some(OWNER_URL_CONSTRAINT) => StorageError::UrlExists(entry.original_url.clone()),
        Some(SLUG_CONSTRAINT) => StorageError::SlugExists(entry.slug.to_string()),
        _ => map_sqlx_error(err),
    }
}

/// Inserts one row on `conn`.
///
/// The live `(owner, url)` pair is checked before the insert so a row that
/// conflicts on both url and slug reports `UrlExists`, as the other backends
/// do. The unique indexes still catch concurrent writers.
async fn insert_row(conn: &mut PgConnection, owner: OwnerId, entry: &NewUrl) -> Result<()> {
    ensure_not_blank(entry)?;

    let url_taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM urls
            WHERE owner_uuid = $1
              AND original_url = $2
              AND NOT is_deleted
        )
        "#,
    )
    .bind(*owner.as_uuid())
    .bind(entry.original_url.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;
    if url_taken {
        return Err(StorageError::UrlExists(entry.original_url.clone()));
    }

    sqlx::query(
        r#"
        INSERT INTO urls (uuid, owner_uuid, short_url, original_url, is_deleted)
        VALUES ($1, $2, $3, $4, FALSE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(*owner.as_uuid())
    .bind(entry.slug.as_str())
    .bind(entry.original_url.as_str())
    .execute(&mut *conn)
    .await
    .map(|_| ())
    .map_err(|err| map_insert_error(err, entry))
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn resolve(&self, slug: &Slug) -> Result<String> {
        let row = sqlx::query(
            r#"
            SELECT original_url, is_deleted
            FROM urls
            WHERE short_url = $1
            "#,
        )
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(slug.to_string()));
        };

        let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;
        if deleted {
            return Err(StorageError::Gone(slug.to_string()));
        }

        row.try_get("original_url").map_err(map_sqlx_error)
    }

    async fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug> {
        let row = sqlx::query(
            r#"
            SELECT short_url
            FROM urls
            WHERE owner_uuid = $1
              AND original_url = $2
              AND NOT is_deleted
            "#,
        )
        .bind(*owner.as_uuid())
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(original_url.to_owned()));
        };

        let slug: String = row.try_get("short_url").map_err(map_sqlx_error)?;
        Ok(Slug::new_unchecked(slug))
    }

    async fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls> {
        let rows = sqlx::query(
            r#"
            SELECT short_url, original_url
            FROM urls
            WHERE owner_uuid = $1
              AND NOT is_deleted
            "#,
        )
        .bind(*owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut urls = OwnedUrls::new();
        for row in rows {
            let slug: String = row.try_get("short_url").map_err(map_sqlx_error)?;
            let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
            urls.insert(Slug::new_unchecked(slug), original_url);
        }

        if urls.is_empty() {
            return Err(StorageError::NotFound(owner.to_string()));
        }
        Ok(urls)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert(&self, owner: OwnerId, slug: &Slug, original_url: &str) -> Result<()> {
        let entry = NewUrl::new(slug.clone(), original_url);
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        insert_row(&mut *conn, owner, &entry).await?;
        debug!(owner = %owner, slug = %slug, "stored url");
        Ok(())
    }

    async fn insert_batch(&self, owner: OwnerId, entries: Vec<NewUrl>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Any failure drops `tx`, which rolls the whole batch back.
        for entry in &entries {
            insert_row(&mut *tx, owner, entry).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(owner = %owner, total = entries.len(), "stored url batch");
        Ok(())
    }

    async fn soft_delete(&self, batch: DeleteBatch) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut unknown_owners = Vec::new();
        let mut marked = 0;

        for (owner, slugs) in batch {
            let known: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM urls WHERE owner_uuid = $1)")
                    .bind(*owner.as_uuid())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            if !known {
                unknown_owners.push(owner);
                continue;
            }

            let slugs: Vec<String> = slugs.into_iter().map(Slug::into_inner).collect();
            let result = sqlx::query(
                r#"
                UPDATE urls
                SET is_deleted = TRUE
                WHERE owner_uuid = $1
                  AND short_url = ANY($2)
                  AND NOT is_deleted
                "#,
            )
            .bind(*owner.as_uuid())
            .bind(&slugs)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            marked += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(marked, "soft-deleted urls");

        match unknown_owners.first() {
            Some(owner) => Err(StorageError::InvalidOwner(*owner)),
            None => Ok(()),
        }
    }
}
