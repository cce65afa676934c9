// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::config::Config;
use crate::device::write_atomic;
use crate::error::{DeviceError, StageError};
use crate::tag::Tagger;

/// Total length of a staged filename stem: a 14-digit timestamp prefix
/// plus random padding. The prefix keeps directory listings chronological;
/// the padding keeps two episodes published the same second from colliding.
const STAGED_STEM_LEN: usize = 24;

/// Everything the device firmware plays
const AUDIO_EXT: &str = "mp3";

/// Filename stem for an episode published at `pub_date`
pub fn staged_filename(pub_date: DateTime<FixedOffset>) -> String {
    let prefix = pub_date
        .with_timezone(&Utc)
        .format("%Y%m%d%H%M%S")
        .to_string();
    let padding: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STAGED_STEM_LEN.saturating_sub(prefix.len()))
        .map(char::from)
        .collect();
    format!("{prefix}{padding}.{AUDIO_EXT}")
}

/// Writes downloaded episodes into the staging tree and hands back the
/// device-relative path the playlist will carry.
pub struct Stager<'a> {
    config: &'a Config,
    tagger: &'a dyn Tagger,
}

impl<'a> Stager<'a> {
    pub fn new(config: &'a Config, tagger: &'a dyn Tagger) -> Self {
        Self { config, tagger }
    }

    /// Stage one episode: tag touch-ups (best-effort), show directory
    /// creation (idempotent), byte-for-byte write.
    pub fn stage(
        &self,
        audio: &[u8],
        show: &str,
        episode_title: &str,
        pub_date: DateTime<FixedOffset>,
        cover: Option<&[u8]>,
    ) -> Result<String, StageError> {
        let show_dir_name = sanitize_filename::sanitize(show);
        let show_dir = self.config.staged_podcasts_dir().join(&show_dir_name);
        std::fs::create_dir_all(&show_dir).map_err(|e| StageError::CreateDirFailed {
            path: show_dir.clone(),
            source: e,
        })?;

        // Tag failures skip the enhancement, never the episode
        let mut staged_bytes = std::borrow::Cow::Borrowed(audio);
        if let Ok(Some(tagged)) = self.tagger.ensure_title(&staged_bytes, episode_title) {
            staged_bytes = std::borrow::Cow::Owned(tagged);
        }
        if let Some(image) = cover
            && let Ok(Some(tagged)) = self.tagger.normalize_cover(&staged_bytes, image)
        {
            staged_bytes = std::borrow::Cow::Owned(tagged);
        }

        let filename = staged_filename(pub_date);
        let path = show_dir.join(&filename);
        std::fs::write(&path, staged_bytes.as_ref()).map_err(|e| StageError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;

        Ok(format!("/Podcasts/{show_dir_name}/{filename}"))
    }
}

/// Playlist entries accumulated over a download run, ordered by publish
/// date across shows (ties broken by show name), regardless of the order
/// feeds were fetched in.
#[derive(Debug, Default)]
pub struct PendingFragment {
    entries: BTreeMap<String, String>,
}

impl PendingFragment {
    pub fn add(&mut self, show: &str, pub_date: DateTime<FixedOffset>, staged_path: String) {
        let key = format!(
            "{}{}",
            pub_date.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S"),
            show
        );
        self.entries.insert(key, staged_path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the sorted entries to the staging fragment file.
    ///
    /// Appending (rather than replacing) preserves entries from an earlier
    /// run that has not been transferred yet.
    pub fn flush(&self, fragment_path: &Path) -> Result<(), DeviceError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        if let Some(parent) = fragment_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DeviceError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut content = if fragment_path.exists() {
            std::fs::read_to_string(fragment_path).map_err(|e| DeviceError::ReadFailed {
                path: fragment_path.to_path_buf(),
                source: e,
            })?
        } else {
            String::new()
        };
        for path in self.entries.values() {
            content.push_str(path);
            content.push('\n');
        }

        write_atomic(fragment_path, content.as_bytes()).map_err(|e| DeviceError::WriteFailed {
            path: fragment_path.to_path_buf(),
            source: e,
        })
    }
}
