// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::backup::run_backups;
use crate::config::Config;
use crate::device::{CommitMode, Lockfile, commit_fragment};
use crate::error::{DeviceError, TransferError};
use crate::journal::JobLog;
use crate::notify::run_notifier;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Tally of one move pass over the staged tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferResult {
    pub files: usize,
    pub dirs: usize,
    pub errors: usize,
}

impl TransferResult {
    /// Human summary, also journaled
    pub fn summary(&self) -> String {
        format!(
            "{} {} of {} {} copied over",
            self.files,
            if self.files == 1 { "episode" } else { "episodes" },
            self.dirs,
            if self.dirs == 1 { "podcast" } else { "podcasts" },
        )
    }
}

/// A completed transfer: what moved and what the playlist received
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub result: TransferResult,
    pub mode: CommitMode,
    pub committed_entries: usize,
}

/// Move staged episodes onto the device and fold them into its playlist.
///
/// Preconditions short-circuit in order: another job holds the lock; the
/// device is not mounted; nothing is staged. The last two never touch the
/// lock. Once moving starts the lock is held by a guard, so it is freed
/// even when the move reports errors.
pub fn transfer(
    config: &Config,
    mode: CommitMode,
    journal: &JobLog,
    reporter: &SharedProgressReporter,
) -> Result<TransferOutcome, TransferError> {
    let lock = Lockfile::new(config.lock_path());
    if lock.is_held() {
        return Err(TransferError::Busy);
    }
    if !config.device_root.exists() {
        return Err(TransferError::NotAttached {
            path: config.device_root.clone(),
        });
    }
    if count_staged_shows(&config.staged_podcasts_dir()) == 0 {
        return Err(TransferError::NothingToDo);
    }

    let _guard = lock.acquire()?;

    reporter.report(ProgressEvent::TransferStarting);

    let to = config.device_podcasts_dir();
    if let Err(e) = std::fs::create_dir_all(&to) {
        return Err(TransferError::Device(DeviceError::WriteFailed {
            path: to,
            source: e,
        }));
    }

    let result = move_dir(&config.staged_podcasts_dir(), &to, reporter);

    reporter.report(ProgressEvent::TransferCompleted {
        files: result.files,
        dirs: result.dirs,
        errors: result.errors,
    });

    if result.errors > 0 {
        return Err(TransferError::MoveFailed {
            errors: result.errors,
        });
    }

    let committed_entries = commit_fragment(config, mode)?;
    reporter.report(ProgressEvent::PlaylistCommitted {
        mode: mode.describe(),
        entries: committed_entries,
    });

    let _ = journal.transfer(mode.describe(), &result.summary());
    run_backups(config, reporter);
    run_notifier(config);

    Ok(TransferOutcome {
        result,
        mode,
        committed_entries,
    })
}

/// Number of staged show directories waiting to be moved
pub fn count_staged_shows(staged_dir: &Path) -> usize {
    match std::fs::read_dir(staged_dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).count(),
        Err(_) => 0,
    }
}

/// Recursively move a directory's contents.
///
/// Each file is copied, the copy verified by hash, and only then is the
/// source removed. A directory is removed only after its whole subtree
/// moved cleanly, so any error leaves everything still unmoved in place
/// for the next attempt.
fn move_dir(from: &Path, to: &Path, reporter: &SharedProgressReporter) -> TransferResult {
    let mut result = TransferResult::default();

    let entries = match std::fs::read_dir(from) {
        Ok(entries) => entries,
        Err(_) => {
            result.errors += 1;
            return result;
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let src = entry.path();
        let dst = to.join(entry.file_name());

        if src.is_dir() {
            if !dst.is_dir() && std::fs::create_dir(&dst).is_err() {
                result.errors += 1;
                continue;
            }
            let subset = move_dir(&src, &dst, reporter);
            result.files += subset.files;
            result.errors += subset.errors;
            result.dirs += subset.dirs + 1;
        } else if move_file(&src, &dst).is_ok() {
            result.files += 1;
            reporter.report(ProgressEvent::FileMoved {
                path: dst.display().to_string(),
            });
        } else {
            result.errors += 1;
        }
    }

    if result.errors == 0 {
        let _ = std::fs::remove_dir(from);
    }
    result
}

/// Copy, verify the copy byte-for-byte via hash, then drop the source
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::copy(from, to)?;
    if hash_file(from)? != hash_file(to)? {
        let _ = std::fs::remove_file(to);
        return Err(std::io::Error::other("copy verification failed"));
    }
    std::fs::remove_file(from)
}

fn hash_file(path: &Path) -> std::io::Result<[u8; 32]> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}
