use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path` via a sibling temp file and an atomic rename.
///
/// Keeps the target from ever being observed truncated mid-write; an
/// interrupted write leaves the old file untouched.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp, path)
}
