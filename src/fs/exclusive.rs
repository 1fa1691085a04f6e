//! Exclusive-create: publish a file only if the path is free.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::atomic::temp_path_for;

/// Create `path` with `content` only if nothing exists there yet.
///
/// Returns `Ok(true)` when this call created the file and `Ok(false)` when
/// the path was already taken. The content is written to a private temp file
/// first and then hard-linked into place, so other processes never observe a
/// partially written file at `path`. Filesystems without hard-link support
/// fall back to `create_new` followed by a write.
pub fn create_exclusive(path: &Path, content: &[u8]) -> io::Result<bool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let temp = temp_path_for(path)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&temp)?;
        if let Err(e) = file.write_all(content).and_then(|()| file.sync_all()) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
    }

    let linked = fs::hard_link(&temp, path);
    let _ = fs::remove_file(&temp);

    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) if link_unsupported(&e) => create_new_fallback(path, content),
        Err(e) => Err(e),
    }
}

fn link_unsupported(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
    )
}

fn create_new_fallback(path: &Path, content: &[u8]) -> io::Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };

    if let Err(e) = file.write_all(content).and_then(|()| file.sync_all()) {
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(true)
}
