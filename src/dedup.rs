//! Content-addressed index of archived outputs.
//!
//! Each distinct content hash has one entry under `files/`, a link to the
//! first archived output that produced those bytes.

use crate::config::DedupCheck;
use crate::error::{ArchiveError, ArchiveResult};
use crate::fs;
use crate::hash::{content_hash, Hash};
use crate::layout::Layout;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Records `canonical` as the archived copy of content `hash`.
pub fn register(
    layout: &Layout,
    check: DedupCheck,
    hash: &Hash,
    canonical: &Path,
) -> ArchiveResult<()> {
    fs::create_dir(&layout.file_bucket(hash))?;
    let entry = layout.file_entry(hash);
    if fs::symlink_file(canonical, &entry)? {
        return Ok(());
    }
    match check {
        DedupCheck::Trust => Ok(()),
        DedupCheck::Verify => verify(hash, &entry, canonical),
    }
}

fn verify(hash: &Hash, entry: &Path, canonical: &Path) -> ArchiveResult<()> {
    let existing = std::fs::read_link(entry).map_err(|err| ArchiveError::read(entry, err))?;
    if fs::stat(entry)? == fs::Stat::Missing {
        // Left behind by an archive run that died before copying its output.
        warn!("replacing dangling entry {:?} -> {:?}", entry, existing);
        std::fs::remove_file(entry).map_err(|source| ArchiveError::Link {
            link: entry.to_path_buf(),
            target: canonical.to_path_buf(),
            source,
        })?;
        fs::symlink_file(canonical, entry)?;
        return Ok(());
    }
    let found = content_hash(entry)?;
    if found != *hash {
        return Err(ArchiveError::DedupConflict {
            hash: hash.to_hex(),
            existing,
        });
    }
    debug!("{} already archived at {:?}", hash, existing);
    Ok(())
}

/// Returns the archived output holding content `hash`, if any.
pub fn resolve(layout: &Layout, hash: &Hash) -> ArchiveResult<Option<PathBuf>> {
    let entry = layout.file_entry(hash);
    match std::fs::read_link(&entry) {
        Ok(target) => Ok(Some(target)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ArchiveError::read(entry, err)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    struct Space {
        dir: tempfile::TempDir,
        layout: Layout,
    }

    impl Space {
        fn new() -> anyhow::Result<Self> {
            let dir = tempfile::tempdir()?;
            let layout = Layout::new(dir.path().join("archive"));
            Ok(Space { dir, layout })
        }

        fn output(&self, name: &str, content: &str) -> anyhow::Result<PathBuf> {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content)?;
            Ok(path)
        }
    }

    #[test]
    fn first_writer_wins() -> anyhow::Result<()> {
        let space = Space::new()?;
        let hash = hash_bytes(b"world");
        let first = space.output("first", "world")?;
        let second = space.output("second", "world")?;

        register(&space.layout, DedupCheck::Trust, &hash, &first)?;
        register(&space.layout, DedupCheck::Trust, &hash, &second)?;
        assert_eq!(resolve(&space.layout, &hash)?, Some(first));
        Ok(())
    }

    #[test]
    fn trust_skips_mismatch() -> anyhow::Result<()> {
        let space = Space::new()?;
        let hash = hash_bytes(b"world");
        let first = space.output("first", "not world")?;
        register(&space.layout, DedupCheck::Trust, &hash, &first)?;
        register(&space.layout, DedupCheck::Trust, &hash, &first)?;
        Ok(())
    }

    #[test]
    fn verify_detects_mismatch() -> anyhow::Result<()> {
        let space = Space::new()?;
        let hash = hash_bytes(b"world");
        let same = space.output("same", "world")?;
        let other = space.output("other", "world")?;
        register(&space.layout, DedupCheck::Verify, &hash, &same)?;
        register(&space.layout, DedupCheck::Verify, &hash, &other)?;

        std::fs::write(&same, "tampered")?;
        let err = register(&space.layout, DedupCheck::Verify, &hash, &other).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        Ok(())
    }

    #[test]
    fn verify_repairs_dangling() -> anyhow::Result<()> {
        let space = Space::new()?;
        let hash = hash_bytes(b"world");
        let gone = space.dir.path().join("gone");
        register(&space.layout, DedupCheck::Verify, &hash, &gone)?;

        let real = space.output("real", "world")?;
        register(&space.layout, DedupCheck::Verify, &hash, &real)?;
        assert_eq!(resolve(&space.layout, &hash)?, Some(real));
        Ok(())
    }

    #[test]
    fn resolve_missing() -> anyhow::Result<()> {
        let space = Space::new()?;
        assert_eq!(resolve(&space.layout, &hash_bytes(b"nothing"))?, None);
        Ok(())
    }
}
