use crate::errors::ResourceError;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

fn temp_path(path: &Path) -> Result<PathBuf, ResourceError> {
    let name = path.file_name().ok_or_else(|| {
        ResourceError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let mut temp = name.to_os_string();
    temp.push(".tmp");
    let mut dotted = std::ffi::OsString::from(".");
    dotted.push(temp);
    Ok(path.with_file_name(dotted))
}

/// Writes `data` next to `path` and renames it into place.
///
/// Readers of `path` see either the old or the new content. The file ends up
/// world-readable on unix. Returns the number of bytes written.
pub fn write_atomic(path: &Path, mut data: impl Read) -> Result<u64, ResourceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ResourceError::io(parent, e))?;
    }

    let temp = temp_path(path)?;
    let written = (|| -> io::Result<u64> {
        let mut file = File::create(&temp)?;
        let written = io::copy(&mut data, &mut file)?;
        file.flush()?;
        file.sync_all()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp, fs::Permissions::from_mode(0o644))?;
        }
        Ok(written)
    })();

    let written = match written {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&temp);
            return Err(ResourceError::io(&temp, e));
        }
    };

    // rename over an existing symlink replaces the link itself
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        ResourceError::io(path, e)
    })?;
    Ok(written)
}

/// Removes a file or symlink, ignoring a missing one. Returns whether
/// something was removed.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, ResourceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ResourceError::io(path, e)),
    }
}

/// Deletes every entry of `dir` and returns how many were removed. A missing
/// directory counts as empty.
pub fn clear_dir(dir: &Path) -> Result<usize, ResourceError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ResourceError::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| ResourceError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ResourceError::io(&path, e))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| ResourceError::io(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| ResourceError::io(&path, e))?;
        }
        removed += 1;
    }
    Ok(removed)
}
