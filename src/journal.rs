use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

/// Append-only log of what the system did and when: one file per year,
/// entries timestamped. Callers treat every write as best-effort; a full
/// disk must not stop a download or transfer.
#[derive(Debug, Clone)]
pub struct JobLog {
    dir: PathBuf,
}

/// Width of the timestamp column, for continuation lines
const TIMESTAMP_PAD: usize = 23;

impl JobLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn download(
        &self,
        title: &str,
        filename: &str,
        duration: &str,
        description: &str,
    ) -> std::io::Result<()> {
        let mut entry = format!("Downloading \"{title}\" [{filename}] - [{duration}]\n");
        entry.push_str(&" ".repeat(TIMESTAMP_PAD));
        entry.push_str(description);
        self.append(&entry)
    }

    pub fn transfer(&self, mode: &str, message: &str) -> std::io::Result<()> {
        self.append(&format!("{mode} - {message}\n-------------------"))
    }

    pub fn toggle(&self, name: &str, enabled: bool) -> std::io::Result<()> {
        let state = if enabled { "on" } else { "off" };
        self.append(&format!("Podcast \"{name}\" turned {state}"))
    }

    pub fn added(&self, name: &str, url: &str) -> std::io::Result<()> {
        self.append(&format!("Podcast \"{name}\" [{url}] added to the library"))
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("podferry_{}.log", Local::now().format("%Y")));
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(
            file,
            "{} -- {entry}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )
    }
}
