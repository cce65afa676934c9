use std::process::Command;

use crate::config::Config;

/// Run the configured post-job notifier, if any.
///
/// The notifier is a user-supplied executable (a status display, a
/// desktop notification script); it being absent or failing is not this
/// program's problem.
pub fn run_notifier(config: &Config) {
    let Some(notifier) = &config.notifier else {
        return;
    };
    if !notifier.is_file() {
        return;
    }
    let _ = Command::new(notifier).status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config_with_notifier(notifier: Option<PathBuf>) -> Config {
        Config {
            device_root: PathBuf::from("/dev/null-device"),
            staging_root: PathBuf::from("/dev/null-staging"),
            database_path: PathBuf::from("/dev/null-db"),
            log_dir: PathBuf::from("/dev/null-logs"),
            notifier,
            backup: None,
        }
    }

    #[test]
    fn no_notifier_configured_is_fine() {
        run_notifier(&config_with_notifier(None));
    }

    #[test]
    fn missing_notifier_executable_is_skipped() {
        let dir = tempdir().unwrap();
        run_notifier(&config_with_notifier(Some(dir.path().join("absent.sh"))));
    }
}
