// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use crate::config::{Config, PODCAST_PLAYLIST};
use crate::device::{BookmarkFile, Playlist};
use crate::error::CleanError;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// What a clean pass removed, grouped by show
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub deleted: BTreeMap<String, usize>,
    /// Entries removed whose show could not be read from the path
    pub unattributed: usize,
}

impl CleanReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum::<usize>() + self.unattributed
    }
}

/// Delete every episode the listener has played past.
///
/// The device bookmark's position for the podcast playlist is the cutoff:
/// that many entries are consumed from the front of the playlist, their
/// files removed from the device. The playlist is persisted after every
/// single removal so an interruption loses at most one entry's worth of
/// consistency, then the bookmark position is reset to zero because the
/// surviving entries now start at index zero.
pub fn clean(config: &Config, reporter: &SharedProgressReporter) -> Result<CleanReport, CleanError> {
    let bookmark_path = config.bookmark_path();
    let mut bookmarks = BookmarkFile::load(&bookmark_path)?;

    // No resume record for the playlist means nothing has been played
    let Some(cutoff) = bookmarks.position_for(PODCAST_PLAYLIST)? else {
        return Ok(CleanReport::default());
    };

    reporter.report(ProgressEvent::CleanStarting { cutoff });

    let playlist_path = config.device_playlist();
    let mut playlist = Playlist::load(&playlist_path)?;
    let mut report = CleanReport::default();

    for _ in 0..cutoff {
        if playlist.is_empty() {
            break;
        }
        let entry = playlist.entries.remove(0);

        let device_file = config
            .device_root
            .join(entry.trim().trim_start_matches('/'));
        // The file may already be gone; the playlist entry is what counts
        let _ = std::fs::remove_file(&device_file);

        match show_segment(&entry) {
            Some(show) => *report.deleted.entry(show.to_string()).or_insert(0) += 1,
            None => report.unattributed += 1,
        }

        reporter.report(ProgressEvent::EntryDeleted {
            path: entry.clone(),
        });

        playlist.save(&playlist_path)?;
    }

    if cutoff > 0 {
        bookmarks.reset_position(PODCAST_PLAYLIST);
        bookmarks.save(&bookmark_path)?;
    }

    reporter.report(ProgressEvent::CleanCompleted {
        deleted: report.total_deleted(),
        shows: report.deleted.len(),
    });

    Ok(report)
}

/// The path component right after the last `Podcasts` directory, provided
/// something follows it (a bare file directly under `Podcasts/` has no show)
fn show_segment(entry: &str) -> Option<&str> {
    let components: Vec<&str> = entry.trim().split('/').collect();
    components
        .iter()
        .enumerate()
        .rev()
        .find(|(i, c)| **c == "Podcasts" && i + 2 < components.len())
        .map(|(i, _)| components[i + 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use tempfile::{TempDir, tempdir};

    fn test_config(dir: &TempDir) -> Config {
        let device_root = dir.path().join("device");
        std::fs::create_dir_all(device_root.join("Playlists")).unwrap();
        std::fs::create_dir_all(device_root.join(".rockbox")).unwrap();
        Config {
            device_root,
            staging_root: dir.path().join("staging"),
            database_path: dir.path().join("subs.db"),
            log_dir: dir.path().join("logs"),
            notifier: None,
            backup: None,
        }
    }

    /// Lay out a device playlist plus matching files and a bookmark cutoff
    fn seed_device(config: &Config, entries: &[&str], position: u64) {
        let mut playlist = String::new();
        for entry in entries {
            playlist.push_str(entry);
            playlist.push('\n');
            let file = config.device_root.join(entry.trim_start_matches('/'));
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, b"audio").unwrap();
        }
        std::fs::write(config.device_playlist(), playlist).unwrap();
        std::fs::write(
            config.bookmark_path(),
            format!(">3;{position};0;0;0;0;0;0;0;/Playlists/Podcasts.m3u8\n"),
        )
        .unwrap();
    }

    fn remaining_entries(config: &Config) -> Vec<String> {
        Playlist::load(&config.device_playlist()).unwrap().entries
    }

    #[test]
    fn clean_removes_the_consumed_prefix() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(
            &config,
            &[
                "/Podcasts/Alpha/e0.mp3",
                "/Podcasts/Alpha/e1.mp3",
                "/Podcasts/Beta/e2.mp3",
                "/Podcasts/Beta/e3.mp3",
                "/Podcasts/Beta/e4.mp3",
            ],
            3,
        );

        let report = clean(&config, &NoopReporter::shared()).unwrap();

        assert_eq!(report.total_deleted(), 3);
        assert_eq!(report.deleted.get("Alpha"), Some(&2));
        assert_eq!(report.deleted.get("Beta"), Some(&1));
        assert_eq!(
            remaining_entries(&config),
            vec!["/Podcasts/Beta/e3.mp3", "/Podcasts/Beta/e4.mp3"]
        );

        // Consumed files gone, survivors untouched
        assert!(!config.device_root.join("Podcasts/Alpha/e0.mp3").exists());
        assert!(!config.device_root.join("Podcasts/Alpha/e1.mp3").exists());
        assert!(!config.device_root.join("Podcasts/Beta/e2.mp3").exists());
        assert!(config.device_root.join("Podcasts/Beta/e3.mp3").exists());
    }

    #[test]
    fn clean_resets_the_bookmark_position() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(&config, &["/Podcasts/Alpha/e0.mp3"], 1);

        clean(&config, &NoopReporter::shared()).unwrap();

        let bookmarks = BookmarkFile::load(&config.bookmark_path()).unwrap();
        assert_eq!(bookmarks.position_for("Podcasts").unwrap(), Some(0));
    }

    #[test]
    fn clean_with_zero_cutoff_deletes_nothing() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(&config, &["/Podcasts/Alpha/e0.mp3"], 0);

        let report = clean(&config, &NoopReporter::shared()).unwrap();

        assert!(report.deleted.is_empty());
        assert_eq!(report.unattributed, 0);
        assert_eq!(remaining_entries(&config), vec!["/Podcasts/Alpha/e0.mp3"]);
        assert!(config.device_root.join("Podcasts/Alpha/e0.mp3").exists());
    }

    #[test]
    fn clean_without_bookmark_record_is_a_noop() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(&config, &["/Podcasts/Alpha/e0.mp3"], 1);
        std::fs::write(config.bookmark_path(), "no records here\n").unwrap();

        let report = clean(&config, &NoopReporter::shared()).unwrap();

        assert!(report.deleted.is_empty());
        assert_eq!(remaining_entries(&config).len(), 1);
    }

    #[test]
    fn clean_with_duplicate_bookmark_records_fails() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(&config, &["/Podcasts/Alpha/e0.mp3"], 1);
        std::fs::write(
            config.bookmark_path(),
            concat!(
                ">1;1;0;0;0;0;0;0;0;/Playlists/Podcasts.m3u8\n",
                ">2;2;0;0;0;0;0;0;0;/Playlists/Podcasts.m3u8\n",
            ),
        )
        .unwrap();

        assert!(clean(&config, &NoopReporter::shared()).is_err());
    }

    #[test]
    fn cutoff_past_playlist_end_stops_at_empty() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(&config, &["/Podcasts/Alpha/e0.mp3"], 5);

        let report = clean(&config, &NoopReporter::shared()).unwrap();

        assert_eq!(report.total_deleted(), 1);
        assert!(remaining_entries(&config).is_empty());
    }

    #[test]
    fn missing_device_file_still_clears_the_entry() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(&config, &["/Podcasts/Alpha/e0.mp3"], 1);
        std::fs::remove_file(config.device_root.join("Podcasts/Alpha/e0.mp3")).unwrap();

        let report = clean(&config, &NoopReporter::shared()).unwrap();

        assert_eq!(report.deleted.get("Alpha"), Some(&1));
        assert!(remaining_entries(&config).is_empty());
    }

    #[test]
    fn unattributable_entries_are_counted_not_fatal() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        seed_device(
            &config,
            &["/stray.mp3", "/Podcasts/Alpha/e1.mp3"],
            2,
        );

        let report = clean(&config, &NoopReporter::shared()).unwrap();

        assert_eq!(report.unattributed, 1);
        assert_eq!(report.deleted.get("Alpha"), Some(&1));
        assert_eq!(report.total_deleted(), 2);
    }

    #[test]
    fn show_segment_reads_the_component_after_podcasts() {
        assert_eq!(
            show_segment("/Podcasts/My Show/file.mp3"),
            Some("My Show")
        );
        assert_eq!(show_segment("/Podcasts/file.mp3"), None);
        assert_eq!(show_segment("/Music/track.mp3"), None);
        assert_eq!(
            show_segment("/backup/Podcasts/Show/deep/file.mp3"),
            Some("Show")
        );
    }
}
