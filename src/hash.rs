//! Content hashes of files and the identity hashes of tasks.
//!
//! A task's identity is derived from the hashes of its inputs' bytes and of
//! its command line, so rerunning an unchanged task on unchanged inputs maps
//! to the same archive entry.

use crate::error::{ArchiveError, ArchiveResult};
use crate::graph::{FileId, Graph, TaskId};
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const HASH_LEN: usize = 20;

/// A 160-bit hash, shown as 40 lowercase hex characters.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = ArchiveError;

    fn from_str(s: &str) -> ArchiveResult<Hash> {
        if s.len() != HASH_LEN * 2 {
            return Err(ArchiveError::InvalidId(s.to_string()));
        }
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ArchiveError::InvalidId(s.to_string()))?;
        Ok(Hash(bytes))
    }
}

/// A hash computed at most once.  Once Computed it is never recomputed, even
/// if whatever it was derived from has since changed.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum Memo {
    #[default]
    Unset,
    Computed(Hash),
}

impl Memo {
    pub fn get(&self) -> Option<Hash> {
        match *self {
            Memo::Unset => None,
            Memo::Computed(hash) => Some(hash),
        }
    }

    pub fn get_or_try_init<E>(&mut self, f: impl FnOnce() -> Result<Hash, E>) -> Result<Hash, E> {
        if let Memo::Computed(hash) = *self {
            return Ok(hash);
        }
        let hash = f()?;
        *self = Memo::Computed(hash);
        Ok(hash)
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash {
    Hash(Sha1::digest(bytes).into())
}

/// Hashes the full contents of the file at `path`.
pub fn content_hash(path: &Path) -> ArchiveResult<Hash> {
    let mut file = std::fs::File::open(path).map_err(|err| ArchiveError::read(path, err))?;
    let mut hasher = Sha1::new();
    std::io::copy(&mut file, &mut hasher).map_err(|err| ArchiveError::read(path, err))?;
    Ok(Hash(hasher.finalize().into()))
}

/// Accumulates the pieces of a task's identity.  Inputs are written first,
/// in order, followed by the command.
#[derive(Default)]
pub struct TaskHasher {
    buf: String,
}

impl TaskHasher {
    pub fn write_input(&mut self, hash: Hash) {
        self.buf.push_str(&hash.to_hex());
    }

    pub fn write_command(&mut self, command: &str) {
        self.buf.push_str(&hash_bytes(command.as_bytes()).to_hex());
    }

    pub fn finish(self) -> Hash {
        hash_bytes(self.buf.as_bytes())
    }
}

/// Returns the content hash of a graph file, hashing it relative to
/// `work_dir` on first use.
pub fn file_hash(graph: &mut Graph, work_dir: &Path, id: FileId) -> ArchiveResult<Hash> {
    let path = work_dir.join(&graph.file(id).name);
    graph
        .file_mut(id)
        .content_hash
        .get_or_try_init(|| content_hash(&path))
}

/// Returns the archive id of a task, computing it from `wrapped_command` and
/// `inputs` only if it hasn't been computed before.
pub fn task_id(
    graph: &mut Graph,
    work_dir: &Path,
    id: TaskId,
    wrapped_command: &str,
    inputs: &[FileId],
) -> ArchiveResult<Hash> {
    if let Some(hash) = graph.task(id).archive_id.get() {
        return Ok(hash);
    }
    let mut hasher = TaskHasher::default();
    for &input in inputs {
        hasher.write_input(file_hash(graph, work_dir, input)?);
    }
    hasher.write_command(wrapped_command);
    let hash = hasher.finish();
    graph.task_mut(id).archive_id = Memo::Computed(hash);
    Ok(hash)
}
