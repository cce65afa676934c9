mod download;
mod stage;

pub use download::{DownloadedAudio, fetch_audio};
pub use stage::{PendingFragment, Stager, staged_filename};
