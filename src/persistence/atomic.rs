//! Crash-safe JSON file replacement.
//!
//! Every persisted file is written with the same sequence:
//! 1. Write to `<name>.tmp` next to the target
//! 2. fsync the temp file
//! 3. Rename over the target
//! 4. fsync the parent directory so the rename itself is durable
//!
//! Readers therefore see either the previous content or the new content,
//! never a partial write.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Returns the temporary sibling used while replacing `path`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serializes `value` as pretty JSON (with a trailing newline) and atomically
/// replaces `path` with it. Parent directories are created as needed.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    bytes.push(b'\n');

    let tmp_path = tmp_path_for(path);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }
    Ok(())
}

/// Syncs a directory so that entries created or renamed in it survive a crash.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    File::open(dir_path)?.sync_all()
}
