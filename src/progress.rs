use std::sync::Arc;

/// Events emitted while downloading, transferring, or cleaning,
/// for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A subscription's feed is being fetched
    FetchingFeed { show: String, url: String },

    /// Feed fetched and filtered against the last-downloaded date
    FeedChecked { show: String, new_episodes: usize },

    /// An episode download is starting
    DownloadStarting {
        show: String,
        episode_title: String,
        content_length: Option<u64>,
    },

    /// Bytes received so far for the episode being downloaded
    DownloadProgress {
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// An episode has been written into the staging tree
    EpisodeStaged {
        show: String,
        episode_title: String,
        staged_path: String,
    },

    /// An episode could not be downloaded or staged
    EpisodeFailed {
        show: String,
        episode_title: String,
        error: String,
    },

    /// A download run finished
    RunCompleted { downloaded: usize, failed: usize },

    /// Staged files are being moved onto the device
    TransferStarting,

    /// One staged file arrived on the device
    FileMoved { path: String },

    /// The move pass finished
    TransferCompleted {
        files: usize,
        dirs: usize,
        errors: usize,
    },

    /// The staged fragment was folded into the device playlist
    PlaylistCommitted { mode: &'static str, entries: usize },

    /// A clean pass found its cutoff position
    CleanStarting { cutoff: u64 },

    /// A consumed episode was removed from disk and playlist
    EntryDeleted { path: String },

    /// The clean pass finished
    CleanCompleted { deleted: usize, shows: usize },

    /// The post-transfer backup step ran (or was skipped)
    BackupFinished { folder: String, ok: bool },
}

/// Trait for reporting progress events.
///
/// Implementations can use this to display progress bars, print status
/// lines, or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
