// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::config::{Config, PODCAST_PLAYLIST};
use crate::device::bookmark::BookmarkFile;
use crate::device::fsutil::write_atomic;
use crate::error::DeviceError;

/// How staged entries are folded into the device playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Add new entries to the end of the playlist
    Append,
    /// Splice new entries in right after the entry currently being played
    Insert,
    /// Replace the playlist wholesale, snapshotting the old one
    Overwrite,
}

impl CommitMode {
    pub fn describe(&self) -> &'static str {
        match self {
            CommitMode::Append => "Append mode",
            CommitMode::Insert => "Insert mode",
            CommitMode::Overwrite => "Overwrite mode",
        }
    }
}

/// An ordered list of device-relative episode paths, one per line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    pub entries: Vec<String>,
}

impl Playlist {
    /// Load a playlist file. A missing file loads as empty.
    pub fn load(path: &Path) -> Result<Self, DeviceError> {
        Ok(Self::parse(&read_or_empty(path)?))
    }

    /// One entry per non-empty line
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Self { entries }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(entry);
            out.push('\n');
        }
        out
    }

    /// Persist via temp file + atomic rename
    pub fn save(&self, path: &Path) -> Result<(), DeviceError> {
        write_atomic(path, self.serialize().as_bytes()).map_err(|e| DeviceError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Commit the staged playlist fragment into the device playlist, then
/// truncate the fragment so a later run cannot commit it twice.
///
/// Append and overwrite work on raw bytes so the committed file is exactly
/// `old + fragment` (or exactly `fragment`). Insert reconstructs the playlist
/// line by line around the bookmark position.
///
/// Returns the number of entries handed over.
pub fn commit_fragment(config: &Config, mode: CommitMode) -> Result<usize, DeviceError> {
    let fragment_path = config.fragment_path();
    let playlist_path = config.device_playlist();

    let fragment_bytes = read_or_empty(&fragment_path)?;
    let committed = Playlist::parse(&fragment_bytes).len();

    match mode {
        CommitMode::Append => {
            let mut combined = read_or_empty(&playlist_path)?;
            combined.push_str(&fragment_bytes);
            write_playlist_bytes(&playlist_path, combined.as_bytes())?;
        }
        CommitMode::Overwrite => {
            if playlist_path.exists() {
                let old = read_or_empty(&playlist_path)?;
                let backup = backup_path(&playlist_path);
                write_atomic(&backup, old.as_bytes()).map_err(|e| DeviceError::WriteFailed {
                    path: backup,
                    source: e,
                })?;
            }
            write_playlist_bytes(&playlist_path, fragment_bytes.as_bytes())?;
        }
        CommitMode::Insert => {
            let bookmarks = BookmarkFile::load(&config.bookmark_path())?;
            match bookmarks.position_for(PODCAST_PLAYLIST)? {
                Some(position) => {
                    let existing = Playlist::load(&playlist_path)?;
                    let fragment = Playlist::parse(&fragment_bytes);
                    let spliced = splice(existing, fragment, position as usize);
                    spliced.save(&playlist_path)?;
                }
                // No resume record for the playlist: nothing is playing, so
                // new entries go to the end rather than being dropped.
                None => return commit_fragment(config, CommitMode::Append),
            }
        }
    }

    truncate_fragment(&fragment_path)?;
    Ok(committed)
}

/// Keep entries `[0..=position]`, then the fragment, then the rest.
/// A position at or past the end degrades to an append.
fn splice(existing: Playlist, fragment: Playlist, position: usize) -> Playlist {
    let head_len = (position + 1).min(existing.entries.len());
    let mut entries = existing.entries;
    let tail = entries.split_off(head_len);
    entries.extend(fragment.entries);
    entries.extend(tail);
    Playlist { entries }
}

/// Empty the staging fragment once its entries live in the device playlist
pub fn truncate_fragment(path: &Path) -> Result<(), DeviceError> {
    if !path.exists() {
        return Ok(());
    }
    write_atomic(path, b"").map_err(|e| DeviceError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn backup_path(playlist: &Path) -> std::path::PathBuf {
    let name = playlist
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    playlist.with_file_name(format!("{name}.old"))
}

fn write_playlist_bytes(path: &Path, bytes: &[u8]) -> Result<(), DeviceError> {
    write_atomic(path, bytes).map_err(|e| DeviceError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_or_empty(path: &Path) -> Result<String, DeviceError> {
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(path).map_err(|e| DeviceError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
