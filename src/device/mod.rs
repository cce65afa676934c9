mod bookmark;
mod fsutil;
mod lock;
mod playlist;

pub(crate) use fsutil::write_atomic;

pub use bookmark::{BookmarkFile, BookmarkLine, BookmarkRecord};
pub use lock::{LockGuard, Lockfile};
pub use playlist::{CommitMode, Playlist, commit_fragment, truncate_fragment};
