pub mod backup;
pub mod clean;
pub mod config;
pub mod device;
pub mod download;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod journal;
pub mod notify;
pub mod progress;
pub mod store;
pub mod tag;
pub mod transfer;

// Re-export main types for convenience
pub use clean::{CleanReport, clean};
pub use config::{Config, PODCAST_PLAYLIST};
pub use device::{BookmarkFile, CommitMode, Lockfile, Playlist};
pub use download::{RunOptions, RunReport, run_downloads};
pub use error::{
    CleanError, ConfigError, DeviceError, DownloadError, FeedError, RunError, StageError,
    StoreError, TagError, TransferError,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use journal::JobLog;
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use store::{Selector, SortOrder, Subscription, SubscriptionStore};
pub use tag::{Id3Tagger, NoopTagger, Tagger};
pub use transfer::{TransferOutcome, TransferResult, transfer};
