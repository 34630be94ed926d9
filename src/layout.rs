//! On-disk layout of the archive.
//!
//! Ids are split git-style into a two character bucket and the remaining
//! characters, so no single directory grows too large:
//!
//! ```text
//! root/jobs/<bucket>/<entry>/{run_info,outputs,input_files,ancestors,descendants}
//! root/files/<bucket>/<entry>
//! ```

use crate::error::{ArchiveError, ArchiveResult};
use crate::hash::{Hash, HASH_LEN};
use std::path::{Component, Path, PathBuf};

pub const JOBS_DIR: &str = "jobs";
pub const FILES_DIR: &str = "files";
pub const OUTPUTS_DIR: &str = "outputs";
pub const INPUTS_DIR: &str = "input_files";
pub const ANCESTORS_DIR: &str = "ancestors";
pub const DESCENDANTS_DIR: &str = "descendants";
pub const RUN_INFO: &str = "run_info";
pub const SOURCE_WORKFLOW: &str = "source_makeflow";

const BUCKET_LEN: usize = 2;

/// Splits a hex id into its bucket and entry names.
pub fn shard(id: &str) -> ArchiveResult<(&str, &str)> {
    if id.len() != HASH_LEN * 2 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ArchiveError::InvalidId(id.to_string()));
    }
    Ok(split(id))
}

fn split(hex: &str) -> (&str, &str) {
    hex.split_at(BUCKET_LEN)
}

/// Validates a workflow file name for use beneath an archive directory,
/// returning it as a relative path.  Only plain components are accepted, so a
/// name can never escape the directory it is placed in.
pub fn checked_name(name: &str) -> ArchiveResult<PathBuf> {
    let invalid = |reason| ArchiveError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => return Err(invalid("parent component")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("absolute path")),
            Component::CurDir => return Err(invalid("current-directory component")),
        }
    }
    // Path::components() silently drops interior "." and repeated
    // separators; reject those too so one name has one spelling.
    if out.as_os_str().len() != name.len() {
        return Err(invalid("redundant separator or component"));
    }
    Ok(out)
}

/// Path construction for an archive rooted at one directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join(JOBS_DIR)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    pub fn job_dir(&self, id: &Hash) -> PathBuf {
        let hex = id.to_hex();
        let (bucket, entry) = split(&hex);
        self.jobs_dir().join(bucket).join(entry)
    }

    pub fn file_bucket(&self, id: &Hash) -> PathBuf {
        let hex = id.to_hex();
        self.files_dir().join(split(&hex).0)
    }

    pub fn file_entry(&self, id: &Hash) -> PathBuf {
        let hex = id.to_hex();
        let (bucket, entry) = split(&hex);
        self.files_dir().join(bucket).join(entry)
    }

    pub fn output(&self, id: &Hash, name: &str) -> ArchiveResult<PathBuf> {
        Ok(self.job_dir(id).join(OUTPUTS_DIR).join(checked_name(name)?))
    }

    pub fn input(&self, id: &Hash, name: &str) -> ArchiveResult<PathBuf> {
        Ok(self.job_dir(id).join(INPUTS_DIR).join(checked_name(name)?))
    }

    /// The link within `id`'s entry pointing at its ancestor `ancestor`.
    pub fn ancestor_link(&self, id: &Hash, ancestor: &Hash) -> PathBuf {
        self.job_dir(id)
            .join(ANCESTORS_DIR)
            .join(ancestor.to_hex())
    }

    /// The link within `id`'s entry pointing at its descendant `descendant`.
    pub fn descendant_link(&self, id: &Hash, descendant: &Hash) -> PathBuf {
        self.job_dir(id)
            .join(DESCENDANTS_DIR)
            .join(descendant.to_hex())
    }

    pub fn run_info(&self, id: &Hash) -> PathBuf {
        self.job_dir(id).join(RUN_INFO)
    }

    pub fn source_workflow(&self, id: &Hash) -> PathBuf {
        self.job_dir(id).join(SOURCE_WORKFLOW)
    }
}
