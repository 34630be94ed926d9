//! Links between the archive entries of dependent tasks.
//!
//! Links are only ever written "upwards", when a task is archived after its
//! ancestors: the task gets a link to each ancestor and each ancestor gets a
//! link back.  A root task has no ancestor links and a leaf no descendant
//! links.

use crate::error::{ArchiveError, ArchiveResult};
use crate::fs;
use crate::hash::Hash;
use crate::layout::{Layout, ANCESTORS_DIR, DESCENDANTS_DIR};
use std::path::Path;

/// Links the entries of `id` and its direct ancestor `ancestor` both ways.
pub fn link(layout: &Layout, id: &Hash, ancestor: &Hash) -> ArchiveResult<()> {
    fs::symlink_dir(&layout.job_dir(ancestor), &layout.ancestor_link(id, ancestor))?;
    fs::symlink_dir(&layout.job_dir(id), &layout.descendant_link(ancestor, id))?;
    Ok(())
}

fn linked_ids(dir: &Path) -> ArchiveResult<Vec<Hash>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(ArchiveError::read(dir, err)),
    };
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ArchiveError::read(dir, err))?;
        let name = entry.file_name();
        let name = name
            .to_str()
            .ok_or_else(|| ArchiveError::corrupt(entry.path(), "non-utf8 link name"))?;
        ids.push(name.parse()?);
    }
    ids.sort();
    Ok(ids)
}

/// Ids of the entries `id` was derived from.
pub fn ancestors(layout: &Layout, id: &Hash) -> ArchiveResult<Vec<Hash>> {
    linked_ids(&layout.job_dir(id).join(ANCESTORS_DIR))
}

/// Ids of the entries derived from `id`.
pub fn descendants(layout: &Layout, id: &Hash) -> ArchiveResult<Vec<Hash>> {
    linked_ids(&layout.job_dir(id).join(DESCENDANTS_DIR))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    #[test]
    fn links_both_ways() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = Layout::new(dir.path());
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        let n = hash_bytes(b"n");
        for id in [&a, &b, &n] {
            std::fs::create_dir_all(layout.job_dir(id))?;
        }

        link(&layout, &n, &a)?;
        link(&layout, &n, &b)?;
        // Relinking is harmless.
        link(&layout, &n, &a)?;

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ancestors(&layout, &n)?, expected);
        assert_eq!(descendants(&layout, &a)?, vec![n]);
        assert_eq!(descendants(&layout, &b)?, vec![n]);
        assert!(descendants(&layout, &n)?.is_empty());
        assert_eq!(
            std::fs::canonicalize(layout.ancestor_link(&n, &a))?,
            std::fs::canonicalize(layout.job_dir(&a))?
        );
        Ok(())
    }
}
