use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Mode for the sender settings file: owner read/write, group read.
pub const SETTINGS_MODE: u32 = 0o640;

#[derive(Debug, Error)]
pub enum AtomicWriteError {
    #[error("Failed to persist temp file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Parent directory does not exist: {0}")]
    NoParentDir(PathBuf),
    #[error("Backup of {path} failed: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Replace `path` with `content` so readers see either the old file or the
/// new one, never a partial write.
///
/// The temp file lives next to the target so the final rename stays on one
/// filesystem.
pub fn atomic_write(path: &Path, content: &[u8], mode: Option<u32>) -> Result<(), AtomicWriteError> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(AtomicWriteError::NoParentDir(path.to_path_buf())),
    };
    if !parent.is_dir() {
        return Err(AtomicWriteError::NoParentDir(parent.to_path_buf()));
    }

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Some(mode) = mode {
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode))?;
    }

    debug!(path = %path.display(), bytes = content.len(), "Atomic write: renaming temp file into place");
    temp.persist(path)?;

    // Persist the directory entry too.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// `<path>.bak`, where the previous version is kept.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Like [`atomic_write`], but first copies an existing file to
/// [`backup_path`].
pub fn atomic_write_with_backup(
    path: &Path,
    content: &[u8],
    mode: Option<u32>,
) -> Result<(), AtomicWriteError> {
    if path.exists() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|source| AtomicWriteError::Backup {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(backup = %backup.display(), "Backed up previous settings file");
    }
    atomic_write(path, content, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.conf");
        atomic_write(&path, b"first", None).unwrap();
        atomic_write(&path, b"second", None).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_backup_keeps_previous_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.conf");
        fs::write(&path, "old").unwrap();

        atomic_write_with_backup(&path, b"new", Some(SETTINGS_MODE)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_to_string(dir.path().join("settings.conf.bak")).unwrap(), "old");
    }

    #[test]
    fn test_no_backup_for_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.conf");
        atomic_write_with_backup(&path, b"new", None).unwrap();
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_applies_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.conf");
        atomic_write(&path, b"x", Some(SETTINGS_MODE)).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SETTINGS_MODE);
    }

    #[test]
    fn test_missing_parent_dir() {
        let result = atomic_write(Path::new("/nonexistent/sendwell/settings.conf"), b"x", None);
        assert!(matches!(result, Err(AtomicWriteError::NoParentDir(_))));
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(backup_path(Path::new("/a/b.conf")), PathBuf::from("/a/b.conf.bak"));
        assert_eq!(backup_path(Path::new("plain")), PathBuf::from("plain.bak"));
    }
}
