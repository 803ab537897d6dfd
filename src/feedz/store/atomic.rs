//! Write-to-temporary-then-rename helpers. Rename within a directory is
//! atomic on the filesystems we care about, so readers see either the old
//! payload or the new one, never a torn write.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

/// Serialize `value` as JSON and atomically replace `path` with it.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    atomic_write_str(path, &serde_json::to_string(value)?)
}

/// Atomically replace `path` with `content`.
pub fn atomic_write_str(path: &Path, content: &str) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
