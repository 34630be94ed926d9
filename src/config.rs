//! Archive configuration, passed explicitly when an archive is opened.

use std::path::PathBuf;

/// How an existing dedup entry is treated when another task produces the
/// same content hash.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum DedupCheck {
    /// Accept the existing entry without reading it; the first writer wins.
    #[default]
    Trust,
    /// Hash the existing entry's target and fail on a mismatch.  A dangling
    /// entry is replaced.
    Verify,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the archive store.
    pub archive_dir: PathBuf,
    /// The workflow definition, copied into the entries of root tasks.
    pub workflow_file: PathBuf,
    /// Directory that workflow file names are relative to, and where restored
    /// outputs are written.
    pub work_dir: PathBuf,
    pub dedup: DedupCheck,
}

impl Config {
    pub fn new(archive_dir: impl Into<PathBuf>, workflow_file: impl Into<PathBuf>) -> Self {
        Config {
            archive_dir: archive_dir.into(),
            workflow_file: workflow_file.into(),
            work_dir: PathBuf::from("."),
            dedup: DedupCheck::default(),
        }
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn dedup(mut self, check: DedupCheck) -> Self {
        self.dedup = check;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new("archive", "Makeflow");
        assert_eq!(config.dedup, DedupCheck::Trust);
        assert_eq!(config.work_dir, PathBuf::from("."));
        assert_eq!(config.dedup(DedupCheck::Verify).dedup, DedupCheck::Verify);
    }
}
