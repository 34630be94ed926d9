//! Filesystem operations used to build archive entries.
//!
//! Entries are shared between processes without locking, so every creation
//! here treats "already exists" as success.

use crate::error::{ArchiveError, ArchiveResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Presence of a path on disk.  This models "file is absent" separately from
/// failing to look.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Stat {
    Missing,
    Present,
}

/// stat() a path, following links.  A dangling link is Missing.
pub fn stat(path: &Path) -> ArchiveResult<Stat> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(Stat::Present),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Stat::Missing),
        Err(err) => Err(ArchiveError::read(path, err)),
    }
}

/// Creates a directory and any missing parents.
pub fn create_dir(path: &Path) -> ArchiveResult<()> {
    std::fs::create_dir_all(path).map_err(|source| ArchiveError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Copies `from` over `to`, creating `to`'s parent directory if needed.
pub fn copy(from: &Path, to: &Path) -> ArchiveResult<()> {
    if let Some(parent) = to.parent() {
        create_dir(parent)?;
    }
    std::fs::copy(from, to).map_err(|source| ArchiveError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Copies `from` to `to` unless `to` already exists, in which case it is left
/// untouched and false is returned.  The bytes are copied into a sibling first
/// and then linked into place, so `to` never holds a partial copy and a
/// concurrent writer can't replace it.
pub fn copy_new(from: &Path, to: &Path) -> ArchiveResult<bool> {
    if stat(to)? == Stat::Present {
        return Ok(false);
    }
    let mut tmp = to.as_os_str().to_owned();
    tmp.push(format!(".tmp{}", std::process::id()));
    let tmp = PathBuf::from(tmp);
    copy(from, &tmp)?;
    let linked = std::fs::hard_link(&tmp, to);
    let removed = std::fs::remove_file(&tmp);
    match linked {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(source) => {
            return Err(ArchiveError::Write {
                path: to.to_path_buf(),
                source,
            })
        }
    }
    removed.map_err(|source| ArchiveError::Write { path: tmp, source })?;
    Ok(true)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path, _dir: bool) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path, dir: bool) -> std::io::Result<()> {
    if dir {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

fn symlink_impl(target: &Path, link: &Path, dir: bool) -> ArchiveResult<bool> {
    if let Some(parent) = link.parent() {
        create_dir(parent)?;
    }
    match make_symlink(target, link, dir) {
        Ok(()) => {
            debug!("link {:?} -> {:?}", link, target);
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(source) => Err(ArchiveError::Link {
            link: link.to_path_buf(),
            target: target.to_path_buf(),
            source,
        }),
    }
}

/// Creates a link at `link` pointing at the file `target`.  Returns false if
/// something already exists at `link`; it is left untouched.
pub fn symlink_file(target: &Path, link: &Path) -> ArchiveResult<bool> {
    symlink_impl(target, link, false)
}

/// Like symlink_file, for a link pointing at a directory.
pub fn symlink_dir(target: &Path, link: &Path) -> ArchiveResult<bool> {
    symlink_impl(target, link, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_dir_twice() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a/b");
        create_dir(&path)?;
        create_dir(&path)?;
        assert_eq!(stat(&path)?, Stat::Present);
        Ok(())
    }

    #[test]
    fn create_dir_over_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("f");
        std::fs::write(&path, "")?;
        let err = create_dir(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CreateDir);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlink_existing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let link = dir.path().join("link");
        std::fs::write(&first, "1")?;
        std::fs::write(&second, "2")?;

        assert!(symlink_file(&first, &link)?);
        assert!(!symlink_file(&second, &link)?);
        assert_eq!(std::fs::read_link(&link)?, first);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_is_missing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let link = dir.path().join("link");
        symlink_file(&dir.path().join("nowhere"), &link)?;
        assert_eq!(stat(&link)?, Stat::Missing);
        Ok(())
    }

    #[test]
    fn copy_new_keeps_existing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::write(&first, "1")?;
        std::fs::write(&second, "2")?;
        let to = dir.path().join("sub/to");

        assert!(copy_new(&first, &to)?);
        assert!(!copy_new(&second, &to)?);
        assert_eq!(std::fs::read(&to)?, b"1");
        // No temporaries are left beside it.
        assert_eq!(std::fs::read_dir(dir.path().join("sub"))?.count(), 1);
        Ok(())
    }

    #[test]
    fn copy_creates_parents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let from = dir.path().join("from");
        std::fs::write(&from, "bytes")?;
        let to = dir.path().join("deep/er/to");
        copy(&from, &to)?;
        assert_eq!(std::fs::read(&to)?, b"bytes");
        Ok(())
    }
}
