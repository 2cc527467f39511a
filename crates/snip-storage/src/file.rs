use crate::index::UrlIndex;
use async_trait::async_trait;
use snip_core::repository::{ReadRepository, Repository, Result};
use snip_core::{DeleteBatch, NewUrl, OwnedUrls, OwnerId, Slug, StorageError, UrlRecord};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Append-only file implementation of the repository contract.
///
/// Every write appends one JSON line per record to the log; on startup the
/// whole log is replayed into an in-memory [`UrlIndex`]. Soft deletes rewrite
/// the entire file so each line reflects the current deletion state.
///
/// The index and the log are guarded by the same lock. A record only enters
/// the index after its line has been written, and deletions are applied to
/// the index only after the rewritten file has replaced the old one, so the
/// two never disagree about what was stored.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    index: Mutex<UrlIndex>,
}

impl FileRepository {
    /// Opens the log at `path`, replaying every stored record.
    ///
    /// A missing file is treated as an empty store and created on the first
    /// write. Blank lines are ignored; malformed or contradicting lines are
    /// skipped with a warning.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let index = replay(&path).await?;

        info!(path = %path.display(), records = index.len(), "file storage loaded");

        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    async fn open_log(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }
}

async fn replay(path: &Path) -> Result<UrlIndex> {
    let mut index = UrlIndex::new();

    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(index),
        Err(err) => return Err(err.into()),
    };

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: UrlRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(err) => {
                warn!(line = line_no + 1, error = %err, "skipping malformed storage line");
                continue;
            }
        };

        if let Err(err) = index.restore(record) {
            warn!(line = line_no + 1, error = %err, "skipping conflicting storage line");
        }
    }

    Ok(index)
}

fn encode_line(record: &UrlRecord) -> Result<String> {
    let mut line =
        serde_json::to_string(record).map_err(|e| StorageError::InvalidData(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

async fn append_line(file: &mut File, record: &UrlRecord) -> Result<()> {
    file.write_all(encode_line(record)?.as_bytes()).await?;
    Ok(())
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn resolve(&self, slug: &Slug) -> Result<String> {
        self.index.lock().await.resolve(slug)
    }

    async fn reverse_resolve(&self, owner: OwnerId, original_url: &str) -> Result<Slug> {
        self.index.lock().await.reverse_resolve(owner, original_url)
    }

    async fn list_owned(&self, owner: OwnerId) -> Result<OwnedUrls> {
        self.index.lock().await.list_owned(owner)
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn insert(&self, owner: OwnerId, slug: &Slug, original_url: &str) -> Result<()> {
        let mut index = self.index.lock().await;
        let record = index.prepare(owner, NewUrl::new(slug.clone(), original_url))?;

        let mut file = self.open_log().await?;
        append_line(&mut file, &record).await?;
        file.flush().await?;

        index.commit(record);
        debug!(owner = %owner, slug = %slug, "stored url");
        Ok(())
    }

    async fn insert_batch(&self, owner: OwnerId, entries: Vec<NewUrl>) -> Result<()> {
        let total = entries.len();
        let mut index = self.index.lock().await;
        let mut file = self.open_log().await?;

        // Best-effort: entries before the first failure stay applied and logged.
        let mut outcome = Ok(());
        for (applied, entry) in entries.into_iter().enumerate() {
            let record = match index.prepare(owner, entry) {
                Ok(record) => record,
                Err(err) => {
                    warn!(owner = %owner, applied, total, error = %err, "batch insert stopped");
                    outcome = Err(err);
                    break;
                }
            };
            if let Err(err) = append_line(&mut file, &record).await {
                outcome = Err(err);
                break;
            }
            index.commit(record);
        }

        file.flush().await?;
        if outcome.is_ok() {
            debug!(owner = %owner, total, "stored url batch");
        }
        outcome
    }

    async fn soft_delete(&self, batch: DeleteBatch) -> Result<()> {
        let mut index = self.index.lock().await;
        // Deletions become visible only once the rewritten log is in place.
        let mut staged = index.clone();
        let report = staged.soft_delete(batch);

        if report.marked > 0 {
            rewrite(&self.path, staged.records()).await?;
            *index = staged;
            debug!(marked = report.marked, path = %self.path.display(), "rewrote storage file");
        }

        report.into_result()
    }
}

/// Replaces the log with one line per record, via a temporary file and a
/// rename so a crash mid-write never truncates the store.
async fn rewrite(path: &Path, records: &[UrlRecord]) -> Result<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(&encode_line(record)?);
    }

    let tmp_path = path.with_extension("tmp");
    let mut tmp = File::create(&tmp_path).await?;
    tmp.write_all(content.as_bytes()).await?;
    tmp.sync_all().await?;
    drop(tmp);

    fs::rename(&tmp_path, path).await?;
    Ok(())
}
