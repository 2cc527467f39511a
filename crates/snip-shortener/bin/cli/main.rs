mod cli;

use crate::cli::{Command, LogFormat, CLI};
use anyhow::Context;
use clap::Parser;
use snip_core::{BatchItem, OwnerId, SaveOutcome, Shortener, Slug};
use snip_generator::RandomGenerator;
use snip_shortener::{ServiceConfig, UrlService};
use snip_storage::{Storage, StorageConfig};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Service = UrlService<Storage, RandomGenerator>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(&config.log_level, config.log_format);

    let storage_config = StorageConfig::builder()
        .database_dsn(config.database_dsn.clone())
        .file_path(config.file_storage_path.clone())
        .connect_timeout(config.connect_timeout())
        .build();

    info!(
        storage_backend = %storage_config.kind(),
        max_attempts = config.max_attempts,
        slug_length = config.slug_length,
        "starting snip"
    );

    let storage = Storage::open(&storage_config)
        .await
        .context("failed to initialise storage")?;
    let generator = RandomGenerator::new(config.slug_length).context("invalid slug length")?;
    let service_config = ServiceConfig::builder()
        .max_attempts(config.max_attempts)
        .delete_interval(config.delete_interval())
        .build();

    let service = UrlService::new(storage, generator, service_config);
    let result = run(&service, config.command).await;
    service.shutdown().await;

    result
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(service: &Service, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { owner, url } => match service.save_url(owner, &url).await? {
            SaveOutcome::Created(slug) => println!("{slug}"),
            SaveOutcome::AlreadyExists(slug) => {
                warn!(slug = %slug, "url was already shortened");
                println!("{slug}");
            }
        },
        Command::Batch { owner, file } => {
            let items = read_batch(&file).await?;
            for result in service.save_batch(owner, items).await? {
                println!("{}", serde_json::to_string(&result)?);
            }
        }
        Command::Resolve { owner, slug } => {
            let owner = owner.unwrap_or_else(OwnerId::generate);
            println!("{}", service.get_url(owner, &slug).await?);
        }
        Command::List { owner } => {
            let urls = service.get_user_urls(owner).await?;
            println!("{}", serde_json::to_string_pretty(&urls)?);
        }
        Command::Delete { owner, slugs } => {
            let slugs = slugs
                .iter()
                .map(|slug| Slug::new(slug.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            let count = slugs.len();
            service.submit_for_delete(owner, slugs).await?;
            info!(owner = %owner, count, "deletion submitted");
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }

    Ok(())
}

/// Reads one [`BatchItem`] per non-blank line.
async fn read_batch(path: &Path) -> anyhow::Result<Vec<BatchItem>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed batch item", path.display(), n + 1))
        })
        .collect()
}
