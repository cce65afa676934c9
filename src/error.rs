use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed for '{name}' contains no dated episodes")]
    NoDatedEpisodes { name: String },
}

/// Errors that can occur while downloading an episode's audio
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

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
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
        source: serde_json::Error,
    },
}

/// Errors raised by the subscription database
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open subscription database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to create database directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    #[error("No subscription matches '{selector}'")]
    NotFound { selector: String },

    #[error("A subscription named '{name}' already exists")]
    Duplicate { name: String },
}

/// Errors touching the device's playlist, bookmark, or lock files
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("More than one bookmark record refers to playlist '{playlist}'")]
    AmbiguousBookmark { playlist: String },

    #[error("Another job holds the lock at {path}")]
    LockHeld { path: PathBuf },
}

/// Errors inspecting or rewriting audio tags.
///
/// Always best-effort at the call sites: a tag failure skips the
/// enhancement, never the episode.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Tag data truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("Unsupported tag version 2.{major}")]
    UnsupportedVersion { major: u8 },

    #[error("Tag uses an extended header, leaving it untouched")]
    ExtendedHeader,
}

/// Errors that can occur while staging a downloaded episode
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to create staging directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write staged episode {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcomes of a transfer run that stop it before any file moves
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("A download or transfer is already in progress; please try again later")]
    Busy,

    #[error("Device is not attached at {path}")]
    NotAttached { path: PathBuf },

    #[error("No staged episodes to copy")]
    NothingToDo,

    #[error("{errors} file(s) could not be copied to the device")]
    MoveFailed { errors: usize },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Errors raised by the consumption cleaner
#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Failure of a single episode within a run; the run itself continues
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Top-level errors for a download run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("A download or transfer is already in progress; please try again later")]
    Busy,

    #[error("No internet connection")]
    Offline,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}
