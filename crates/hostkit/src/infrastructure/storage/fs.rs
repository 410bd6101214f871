//! File system implementation of [`ConfigStorage`].

use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{chown, MetadataExt, PermissionsExt};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::application::patch_config::ConfigStorage;

/// Mode for config files that did not exist before hostkit wrote them.
const DEFAULT_MODE: u32 = 0o644;

/// Reads and writes config files and their backups on the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsConfigStorage;

impl FsConfigStorage {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigStorage for FsConfigStorage {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        atomic_write(path, contents)
    }

    fn snapshot(&self, source: &Path, dest: &Path, permanent: bool) -> io::Result<()> {
        let content = fs::read(source)?;
        let meta = fs::metadata(source)?;

        let mut perms = meta.permissions();
        if permanent {
            perms.set_mode(perms.mode() & 0o444);
        }
        write_new(dest, perms, |file| file.write_all(&content))
    }

    fn restore(&self, backup: &Path, live: &Path) -> io::Result<()> {
        let content = fs::read_to_string(backup)?;
        atomic_write(live, &content)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Creates `dest` from a temp file that `fill` writes, refusing to replace an
/// existing file.
///
/// `dest` appears only once it is complete, synced and carries `perms`; if
/// `fill` fails the temp file is removed and `dest` is never created.
fn write_new(
    dest: &Path,
    perms: Permissions,
    fill: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let dir = match dest.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    if dest.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        ));
    }

    let mut tmp = NamedTempFile::new_in(dir)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(perms)?;

    tmp.persist_noclobber(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Replaces `path` with `contents` via a temp file in the same directory.
///
/// The new file keeps the old one's mode and, when permitted, its owner.
pub(crate) fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let previous = fs::metadata(path).ok();

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;

    let mode = previous.as_ref().map_or(DEFAULT_MODE, |m| m.mode() & 0o7777);
    tmp.as_file().set_permissions(Permissions::from_mode(mode))?;
    if let Some(meta) = &previous {
        if let Err(e) = chown(tmp.path(), Some(meta.uid()), Some(meta.gid())) {
            debug!("could not keep owner of {}: {e}", path.display());
        }
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_replaces_content_and_keeps_mode() {
        // Arrange
        let dir = tempdir().unwrap();
        let path = dir.path().join("sshd_config");
        fs::write(&path, "old\n").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(0o600)).unwrap();

        // Act
        FsConfigStorage::new().write(&path, "new\n").unwrap();

        // Assert
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_write_new_file_uses_default_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.conf");

        FsConfigStorage::new().write(&path, "a b\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_snapshot_refuses_to_overwrite() {
        // Arrange
        let dir = tempdir().unwrap();
        let live = dir.path().join("sshd_config");
        let backup = dir.path().join("sshd_config.bak.original");
        fs::write(&live, "v1\n").unwrap();
        let storage = FsConfigStorage::new();
        storage.snapshot(&live, &backup, true).unwrap();
        fs::write(&live, "v2\n").unwrap();

        // Act
        let err = storage.snapshot(&live, &backup, true).unwrap_err();

        // Assert
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "v1\n");
    }

    #[test]
    fn test_failed_snapshot_write_leaves_no_backup_behind() {
        // Arrange
        let dir = tempdir().unwrap();
        let backup = dir.path().join("sshd_config.bak.original");

        // Act
        let result = write_new(&backup, Permissions::from_mode(0o444), |file| {
            file.write_all(b"PermitRootLogin")?;
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        });

        // Assert
        assert!(result.is_err());
        assert!(!backup.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_snapshot_into_missing_backup_dir_creates_it() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("sshd_config");
        let backup = dir.path().join("backups").join("sshd_config.bak.original");
        fs::write(&live, "v1\n").unwrap();

        FsConfigStorage::new().snapshot(&live, &backup, true).unwrap();

        assert_eq!(fs::read_to_string(&backup).unwrap(), "v1\n");
    }

    #[test]
    fn test_permanent_snapshot_is_read_only() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("sshd_config");
        let backup = dir.path().join("sshd_config.bak.original");
        fs::write(&live, "v1\n").unwrap();

        FsConfigStorage::new().snapshot(&live, &backup, true).unwrap();

        assert!(fs::metadata(&backup).unwrap().permissions().readonly());
    }

    #[test]
    fn test_timestamped_snapshot_is_writable() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("sshd_config");
        let backup = dir.path().join("sshd_config.bak.1700000000");
        fs::write(&live, "v1\n").unwrap();

        FsConfigStorage::new().snapshot(&live, &backup, false).unwrap();

        assert!(!fs::metadata(&backup).unwrap().permissions().readonly());
    }

    #[test]
    fn test_restore_copies_backup_over_live_file() {
        let dir = tempdir().unwrap();
        let live = dir.path().join("sshd_config");
        let backup = dir.path().join("sshd_config.bak.original");
        fs::write(&backup, "original\n").unwrap();
        fs::write(&live, "patched\n").unwrap();

        FsConfigStorage::new().restore(&backup, &live).unwrap();

        assert_eq!(fs::read_to_string(&live).unwrap(), "original\n");
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let names = FsConfigStorage::new().list(&dir.path().join("nope")).unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_list_skips_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.bak.1"), "").unwrap();
        fs::create_dir(dir.path().join("a.bak.2")).unwrap();

        let names = FsConfigStorage::new().list(dir.path()).unwrap();

        assert_eq!(names, vec!["a.bak.1".to_string()]);
    }
}
