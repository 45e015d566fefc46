use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Atomic file write using write-then-rename.
///
/// Readers observe either the previous content or the new content in full.
/// The temp file lives next to the target so the rename stays on one
/// filesystem.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Config(format!("Invalid file path: {}", path.display())))?;
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(contents.as_bytes())?;
    // Data must be on disk before the rename makes it visible
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
