//! Errors produced by archive operations.
//!
//! Every failure names the path it concerns so the caller can report it
//! verbatim; none of them terminate the process.

use std::path::PathBuf;
use thiserror::Error;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("copy {from:?} to {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symlink {link:?} -> {target:?}: {source}")]
    Link {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive entry {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid archive id {0:?}")]
    InvalidId(String),

    #[error("invalid file name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("content {hash} already archived at {existing:?} with different bytes")]
    DedupConflict { hash: String, existing: PathBuf },

    #[error("predecessor of {command:?} has no archive id; archive it first")]
    AncestorNotArchived { command: String },

    #[error("task {command:?} has no archive id; check is_preserved first")]
    UnknownTaskId { command: String },
}

/// Coarse classification of an [`ArchiveError`], used by callers to decide
/// whether a failure should stop the whole run.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Read,
    CreateDir,
    Copy,
    Link,
    Corrupt,
    /// Malformed ids or names, or a violated ordering contract.
    Usage,
    Conflict,
}

impl ArchiveError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ArchiveError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::Read { .. } => ErrorKind::Read,
            ArchiveError::CreateDir { .. } => ErrorKind::CreateDir,
            // A run record that can't be written is as fatal to the entry as
            // an output that can't be copied.
            ArchiveError::Copy { .. } | ArchiveError::Write { .. } => ErrorKind::Copy,
            ArchiveError::Link { .. } => ErrorKind::Link,
            ArchiveError::Corrupt { .. } => ErrorKind::Corrupt,
            ArchiveError::InvalidId(_)
            | ArchiveError::InvalidName { .. }
            | ArchiveError::AncestorNotArchived { .. }
            | ArchiveError::UnknownTaskId { .. } => ErrorKind::Usage,
            ArchiveError::DedupConflict { .. } => ErrorKind::Conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_path() {
        let err = ArchiveError::CreateDir {
            path: PathBuf::from("/archive/jobs/ab"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/archive/jobs/ab"));
        assert_eq!(err.kind(), ErrorKind::CreateDir);
    }

    #[test]
    fn write_counts_as_copy() {
        let err = ArchiveError::Write {
            path: PathBuf::from("run_info"),
            source: std::io::Error::from(std::io::ErrorKind::Other),
        };
        assert_eq!(err.kind(), ErrorKind::Copy);
    }

    #[test]
    fn usage_kinds() {
        assert_eq!(ArchiveError::InvalidId("zz".into()).kind(), ErrorKind::Usage);
        let err = ArchiveError::InvalidName {
            name: "../x".into(),
            reason: "parent component",
        };
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
