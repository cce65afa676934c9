use std::process::Command;

use crate::config::Config;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Device folders mirrored after a transfer. The flag says whether the
/// mirror also drops files the device no longer has; Music is curated
/// elsewhere, so its backup only ever grows.
const BACKUP_FOLDERS: [(&str, bool); 3] =
    [("Podcasts", true), ("Music", false), ("Playlists", true)];

/// Mirror the device onto local disk with the configured sync tool.
///
/// Entirely best-effort: no backup section in the config, a missing tool,
/// or a failing run all leave the transfer result untouched.
pub fn run_backups(config: &Config, reporter: &SharedProgressReporter) {
    let Some(backup) = &config.backup else {
        return;
    };
    if std::fs::create_dir_all(&backup.dest).is_err() {
        return;
    }

    for (folder, delete) in BACKUP_FOLDERS {
        let src = config.device_root.join(folder);
        if !src.exists() {
            continue;
        }

        let mut cmd = Command::new(&backup.tool);
        cmd.arg("-a");
        if delete {
            cmd.arg("--delete");
        }
        // Trailing slash: sync the folder's contents, not the folder
        cmd.arg(format!("{}/", src.display()));
        cmd.arg(backup.dest.join(folder));

        let ok = cmd.status().map(|s| s.success()).unwrap_or(false);
        reporter.report(ProgressEvent::BackupFinished {
            folder: folder.to_string(),
            ok,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupConfig;
    use crate::progress::NoopReporter;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn no_backup_config_is_a_noop() {
        let dir = tempdir().unwrap();
        let config = Config {
            device_root: dir.path().to_path_buf(),
            staging_root: dir.path().to_path_buf(),
            database_path: dir.path().join("subs.db"),
            log_dir: dir.path().join("logs"),
            notifier: None,
            backup: None,
        };

        run_backups(&config, &NoopReporter::shared());
    }

    #[test]
    fn missing_tool_does_not_panic() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("device/Podcasts")).unwrap();
        let config = Config {
            device_root: dir.path().join("device"),
            staging_root: dir.path().join("staging"),
            database_path: dir.path().join("subs.db"),
            log_dir: dir.path().join("logs"),
            notifier: None,
            backup: Some(BackupConfig {
                tool: PathBuf::from("/nonexistent/sync-tool"),
                dest: dir.path().join("backup"),
            }),
        };

        run_backups(&config, &NoopReporter::shared());

        assert!(dir.path().join("backup").exists());
    }
}
