// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Name of the playlist on the device that podferry owns
pub const PODCAST_PLAYLIST: &str = "Podcasts";

/// Playlist file extension used by the device firmware
pub const PLAYLIST_EXT: &str = "m3u8";

/// Settings for the post-transfer backup step
#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// External sync tool to invoke
    #[serde(default = "default_backup_tool")]
    pub tool: PathBuf,
    /// Local directory the device folders are mirrored into
    pub dest: PathBuf,
}

fn default_backup_tool() -> PathBuf {
    PathBuf::from("rsync")
}

/// All paths and collaborator locations the components need.
///
/// Constructed once and passed explicitly; nothing in the crate reads a
/// hard-coded path.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Mount point of the media player
    pub device_root: PathBuf,

    /// Local staging area for downloaded episodes
    pub staging_root: PathBuf,

    /// Subscription database location
    pub database_path: PathBuf,

    /// Directory the year-stamped job log is written into
    pub log_dir: PathBuf,

    /// Optional executable run after a download or transfer completes
    #[serde(default)]
    pub notifier: Option<PathBuf>,

    /// Optional post-transfer backup target
    #[serde(default)]
    pub backup: Option<BackupConfig>,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The playlist file on the device
    pub fn device_playlist(&self) -> PathBuf {
        self.device_root
            .join("Playlists")
            .join(format!("{PODCAST_PLAYLIST}.{PLAYLIST_EXT}"))
    }

    /// The device's resume-bookmark file
    pub fn bookmark_path(&self) -> PathBuf {
        self.device_root.join(".rockbox").join("most-recent.bmark")
    }

    /// The staged playlist fragment awaiting commit
    pub fn fragment_path(&self) -> PathBuf {
        self.staging_root
            .join("Playlists")
            .join(format!("{PODCAST_PLAYLIST}.{PLAYLIST_EXT}"))
    }

    /// The advisory lockfile shared by download and transfer runs
    pub fn lock_path(&self) -> PathBuf {
        self.staging_root.join("podferry.lock")
    }

    /// Staged episodes waiting to be moved, one subdirectory per show
    pub fn staged_podcasts_dir(&self) -> PathBuf {
        self.staging_root.join("Podcasts")
    }

    /// Episode tree on the device
    pub fn device_podcasts_dir(&self) -> PathBuf {
        self.device_root.join("Podcasts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_parses_minimal_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "device_root": "/media/player",
                "staging_root": "/home/me/podcasts",
                "database_path": "/home/me/podcasts/subscriptions.db",
                "log_dir": "/home/me/podcasts/logs"
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.device_root, PathBuf::from("/media/player"));
        assert!(config.notifier.is_none());
        assert!(config.backup.is_none());
    }

    #[test]
    fn load_parses_backup_section_with_default_tool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "device_root": "/media/player",
                "staging_root": "/home/me/podcasts",
                "database_path": "/home/me/podcasts/subscriptions.db",
                "log_dir": "/home/me/podcasts/logs",
                "backup": { "dest": "/home/me/backup" }
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        let backup = config.backup.unwrap();
        assert_eq!(backup.tool, PathBuf::from("rsync"));
        assert_eq!(backup.dest, PathBuf::from("/home/me/backup"));
    }

    #[test]
    fn derived_paths_hang_off_the_roots() {
        let config = Config {
            device_root: PathBuf::from("/media/player"),
            staging_root: PathBuf::from("/staging"),
            database_path: PathBuf::from("/staging/subscriptions.db"),
            log_dir: PathBuf::from("/staging/logs"),
            notifier: None,
            backup: None,
        };

        assert_eq!(
            config.device_playlist(),
            PathBuf::from("/media/player/Playlists/Podcasts.m3u8")
        );
        assert_eq!(
            config.bookmark_path(),
            PathBuf::from("/media/player/.rockbox/most-recent.bmark")
        );
        assert_eq!(
            config.fragment_path(),
            PathBuf::from("/staging/Playlists/Podcasts.m3u8")
        );
        assert_eq!(config.lock_path(), PathBuf::from("/staging/podferry.lock"));
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempdir().unwrap();
        assert!(Config::load(&dir.path().join("absent.json")).is_err());
    }
}
