use clap::{Parser, Subcommand, ValueEnum};
use snip_core::OwnerId;
use snip_generator::DEFAULT_SLUG_LENGTH;
use snip_shortener::config::{DEFAULT_DELETE_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use snip_storage::storage::DEFAULT_CONNECT_TIMEOUT;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DATABASE_DSN_ENV: &str = "SNIP_DATABASE_DSN";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIP_FILE_STORAGE_PATH";
pub const LOG_LEVEL_ENV: &str = "SNIP_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";
pub const MAX_ATTEMPTS_ENV: &str = "SNIP_MAX_ATTEMPTS";
pub const SLUG_LENGTH_ENV: &str = "SNIP_SLUG_LENGTH";
pub const DELETE_INTERVAL_MS_ENV: &str = "SNIP_DELETE_INTERVAL_MS";
pub const CONNECT_TIMEOUT_MS_ENV: &str = "SNIP_CONNECT_TIMEOUT_MS";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_DELETE_INTERVAL_MS: u64 = DEFAULT_DELETE_INTERVAL.as_millis() as u64;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = DEFAULT_CONNECT_TIMEOUT.as_millis() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip", about = "Shorten, resolve and delete URLs")]
pub struct CLI {
    /// PostgreSQL connection string; takes precedence over the file store.
    #[arg(long, env = DATABASE_DSN_ENV, global = true)]
    pub database_dsn: Option<String>,

    /// JSON-lines file to persist URLs in when no database is configured.
    #[arg(long, env = FILE_STORAGE_PATH_ENV, global = true)]
    pub file_storage_path: Option<PathBuf>,

    #[arg(long, env = LOG_LEVEL_ENV, default_value = DEFAULT_LOG_LEVEL, global = true)]
    pub log_level: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    #[arg(long, env = MAX_ATTEMPTS_ENV, default_value_t = DEFAULT_MAX_ATTEMPTS, global = true)]
    pub max_attempts: usize,

    #[arg(long, env = SLUG_LENGTH_ENV, default_value_t = DEFAULT_SLUG_LENGTH, global = true)]
    pub slug_length: usize,

    #[arg(
        long,
        env = DELETE_INTERVAL_MS_ENV,
        default_value_t = DEFAULT_DELETE_INTERVAL_MS,
        global = true
    )]
    pub delete_interval_ms: u64,

    #[arg(
        long,
        env = CONNECT_TIMEOUT_MS_ENV,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_MS,
        global = true
    )]
    pub connect_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl CLI {
    pub fn delete_interval(&self) -> Duration {
        Duration::from_millis(self.delete_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one URL.
    Shorten {
        #[arg(long)]
        owner: OwnerId,
        url: String,
    },
    /// Shorten every `{correlation_id, original_url}` line of a JSON-lines file.
    Batch {
        #[arg(long)]
        owner: OwnerId,
        file: PathBuf,
    },
    /// Print the original URL behind a slug.
    Resolve {
        #[arg(long)]
        owner: Option<OwnerId>,
        slug: String,
    },
    /// List the live URLs of an owner.
    List {
        #[arg(long)]
        owner: OwnerId,
    },
    /// Soft-delete slugs owned by an owner.
    Delete {
        #[arg(long)]
        owner: OwnerId,
        #[arg(required = true)]
        slugs: Vec<String>,
    },
    /// Check that the storage backend is reachable.
    Ping,
}
