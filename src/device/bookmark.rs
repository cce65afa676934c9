// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::Range;
use std::path::Path;

use crate::device::fsutil::write_atomic;
use crate::error::DeviceError;

/// Prefix of the playlist path inside a bookmark record
const PLAYLIST_PATH_PREFIX: &str = "/Playlists/";

/// Suffix of the playlist path inside a bookmark record
const PLAYLIST_PATH_SUFFIX: &str = ".m3u8";

/// A record line the firmware understands:
/// `>{id};{position};{seven numeric fields};/Playlists/{name}.m3u8`
///
/// The raw line bytes are kept so everything outside the position digits
/// round-trips untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRecord {
    raw: String,
    /// Resume position within the playlist, zero-based entry count
    pub position: u64,
    /// Byte range of the position digits inside `raw`
    position_span: Range<usize>,
    /// Playlist the record refers to, extension stripped
    pub playlist: String,
}

impl BookmarkRecord {
    /// Replace the position digits with `0`, leaving every other byte as-is
    fn reset_position(&mut self) {
        if self.position == 0 && self.position_span.len() == 1 {
            return;
        }
        let mut rebuilt = String::with_capacity(self.raw.len());
        rebuilt.push_str(&self.raw[..self.position_span.start]);
        rebuilt.push('0');
        rebuilt.push_str(&self.raw[self.position_span.end..]);
        self.position_span = self.position_span.start..self.position_span.start + 1;
        self.position = 0;
        self.raw = rebuilt;
    }

    fn as_str(&self) -> &str {
        &self.raw
    }
}

/// One line of the bookmark file: a parsed record, or anything else verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkLine {
    Record(BookmarkRecord),
    Opaque(String),
}

/// The device's resume-bookmark file, soft-parsed.
///
/// Lines that do not match the record shape are carried through byte-exactly;
/// a malformed line never fails the whole file.
#[derive(Debug, Clone, Default)]
pub struct BookmarkFile {
    lines: Vec<BookmarkLine>,
}

impl BookmarkFile {
    /// Load and parse the bookmark file. A missing file parses as empty.
    pub fn load(path: &Path) -> Result<Self, DeviceError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| DeviceError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse bookmark content, preserving line terminators inside each line
    pub fn parse(content: &str) -> Self {
        let lines = content
            .split_inclusive('\n')
            .map(|line| match parse_record(line) {
                Some(record) => BookmarkLine::Record(record),
                None => BookmarkLine::Opaque(line.to_string()),
            })
            .collect();
        Self { lines }
    }

    /// Resume position for `playlist`, or `None` when no record refers to it.
    ///
    /// More than one matching record means the file is corrupt; splicing or
    /// cleaning once per duplicate would double-apply, so this fails instead.
    pub fn position_for(&self, playlist: &str) -> Result<Option<u64>, DeviceError> {
        let mut found = None;
        for record in self.records() {
            if record.playlist == playlist {
                if found.is_some() {
                    return Err(DeviceError::AmbiguousBookmark {
                        playlist: playlist.to_string(),
                    });
                }
                found = Some(record.position);
            }
        }
        Ok(found)
    }

    /// Set the position of the record referring to `playlist` back to zero.
    /// Returns whether a record matched.
    pub fn reset_position(&mut self, playlist: &str) -> bool {
        let mut matched = false;
        for line in &mut self.lines {
            if let BookmarkLine::Record(record) = line
                && record.playlist == playlist
            {
                record.reset_position();
                matched = true;
            }
        }
        matched
    }

    /// Serialize every line back out, records patched, opaque lines verbatim
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                BookmarkLine::Record(record) => out.push_str(record.as_str()),
                BookmarkLine::Opaque(raw) => out.push_str(raw),
            }
        }
        out
    }

    /// Persist the full line set via temp file + atomic rename
    pub fn save(&self, path: &Path) -> Result<(), DeviceError> {
        write_atomic(path, self.serialize().as_bytes()).map_err(|e| DeviceError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn records(&self) -> impl Iterator<Item = &BookmarkRecord> {
        self.lines.iter().filter_map(|line| match line {
            BookmarkLine::Record(record) => Some(record),
            BookmarkLine::Opaque(_) => None,
        })
    }

    #[cfg(test)]
    pub(crate) fn lines(&self) -> &[BookmarkLine] {
        &self.lines
    }
}

/// A run of ASCII digits, possibly empty. The firmware writes empty fields
/// for never-resumed playlists; an empty position reads as zero.
fn digit_field(s: &str) -> Option<u64> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(s.parse().unwrap_or(0))
}

fn parse_record(line: &str) -> Option<BookmarkRecord> {
    let body = line.strip_prefix('>')?;

    // id;position;f1;..;f7;path: ten fields, the last one is the path
    let mut fields = body.splitn(10, ';');
    let id = fields.next()?;
    let position_field = fields.next()?;

    digit_field(id)?;
    let position = digit_field(position_field)?;

    for _ in 0..7 {
        digit_field(fields.next()?)?;
    }

    let path = fields.next()?;
    let name_and_rest = path.strip_prefix(PLAYLIST_PATH_PREFIX)?;
    let end = name_and_rest.rfind(PLAYLIST_PATH_SUFFIX)?;
    let playlist = name_and_rest[..end].to_string();

    let span_start = 1 + id.len() + 1;
    let position_span = span_start..span_start + position_field.len();

    Some(BookmarkRecord {
        raw: line.to_string(),
        position,
        position_span,
        playlist,
    })
}
