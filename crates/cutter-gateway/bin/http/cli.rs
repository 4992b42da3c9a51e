use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const STORAGE_BACKEND_ENV: &str = "CUTTER_STORAGE_BACKEND";
pub const CODE_LENGTH_ENV: &str = "CUTTER_CODE_LENGTH";
pub const DEADLINE_MS_ENV: &str = "CUTTER_DEADLINE_MS";
pub const DELETION_QUEUE_CAPACITY_ENV: &str = "CUTTER_DELETION_QUEUE_CAPACITY";
pub const LOG_FORMAT_ENV: &str = "CUTTER_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "volatile")]
    Volatile,
    #[value(name = "logged")]
    Logged,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Volatile => write!(f, "volatile"),
            StorageBackendArg::Logged => write!(f, "logged"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "cutter", about = "URL shortening service")]
pub struct CLI {
    #[arg(short = 'a', long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of every short URL handed out.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Defaults to postgres when a DSN is set, else logged when a file path
    /// is set, else volatile.
    #[arg(long, env = STORAGE_BACKEND_ENV, value_enum)]
    pub storage: Option<StorageBackendArg>,

    #[arg(long, env = CODE_LENGTH_ENV, default_value_t = cutter_generator::random::DEFAULT_CODE_LENGTH)]
    pub code_length: usize,

    /// Upper bound on each storage call, in milliseconds.
    #[arg(long, env = DEADLINE_MS_ENV)]
    pub deadline_ms: Option<u64>,

    #[arg(
        long,
        env = DELETION_QUEUE_CAPACITY_ENV,
        default_value_t = cutter_shortener::DEFAULT_QUEUE_CAPACITY
    )]
    pub deletion_queue_capacity: usize,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl CLI {
    pub fn storage_backend(&self) -> StorageBackendArg {
        match (self.storage, &self.database_dsn, &self.file_storage_path) {
            (Some(backend), _, _) => backend,
            (None, Some(_), _) => StorageBackendArg::Postgres,
            (None, None, Some(_)) => StorageBackendArg::Logged,
            (None, None, None) => StorageBackendArg::Volatile,
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}
