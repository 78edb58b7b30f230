use std::path::PathBuf;

use clap::error::ErrorKind;
use thiserror::Error;

/// Errors that can occur when fetching or parsing feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} fetching feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Badly formed feed: {0}")]
    BadlyFormed(#[source] rss::Error),
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to move download into place at {path}: {source}")]
    FinalizeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by podcast state transitions
#[derive(Error, Debug)]
pub enum PodcastError {
    #[error("Refusing to merge feed {theirs} into podcast {ours}")]
    MergeConflict { ours: String, theirs: String },
}

/// Errors that can occur when reading or writing podcast documents
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read podcast document {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write podcast document {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete podcast document {path}: {source}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse podcast JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize podcast: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),

    #[error("Podcast {url} already exists: {path}")]
    AlreadyExists { url: String, path: PathBuf },

    #[error("Document {path} for {url} is already used by {existing_url}")]
    HashCollision {
        url: String,
        existing_url: String,
        path: PathBuf,
    },
}

/// Errors that can occur when loading the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors raised by operations over the podcast collection
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Filter '{filter}' matches {matches} podcasts, expected exactly one")]
    AmbiguousFilter { filter: String, matches: usize },

    #[error("Failed to export podcasts to {path}: {source}")]
    ExportFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to import podcasts from {path}: {reason}")]
    ImportFailed { path: PathBuf, reason: String },

    #[error("Failed to set up HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Errors describing why a command's arguments were rejected
///
/// Each variant carries clap's rendered error, which includes usage.
#[derive(Error, Debug)]
pub enum ArgError {
    #[error("{0}")]
    Missing(clap::Error),

    #[error("{0}")]
    Invalid(clap::Error),

    #[error("{0}")]
    Unexpected(clap::Error),

    #[error("{0}")]
    Usage(clap::Error),
}

impl From<clap::Error> for ArgError {
    fn from(err: clap::Error) -> Self {
        match err.kind() {
            ErrorKind::MissingRequiredArgument => Self::Missing(err),
            ErrorKind::InvalidValue | ErrorKind::ValueValidation => Self::Invalid(err),
            ErrorKind::UnknownArgument => Self::Unexpected(err),
            _ => Self::Usage(err),
        }
    }
}

/// Failure returned by a command handler
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Args(#[from] ArgError),

    #[error(transparent)]
    Manager(#[from] ManagerError),
}

/// Errors surfaced by the command registry
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Bad syntax for '{command}': {source}")]
    Syntax {
        command: String,
        #[source]
        source: ArgError,
    },

    #[error("'{command}' failed: {source}")]
    Failed {
        command: String,
        #[source]
        source: ManagerError,
    },
}
