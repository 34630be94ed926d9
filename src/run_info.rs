//! The run record stored with each archived task.
//!
//! The record is eight newline-terminated fields in a fixed order: unwrapped
//! command, wrapped command, submitted, started and finished timestamps,
//! exited-normally flag (0/1), exit code, exit signal.

use crate::error::{ArchiveError, ArchiveResult};
use std::io::Write;
use std::path::Path;

/// What the job runner reports about a finished task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecInfo {
    pub submitted: i64,
    pub started: i64,
    pub finished: i64,
    pub exited_normally: bool,
    pub exit_code: i32,
    pub exit_signal: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub command: String,
    pub wrapped_command: String,
    pub exec: ExecInfo,
}

const FIELDS: usize = 8;

fn parse_field<T: std::str::FromStr>(path: &Path, name: &str, text: &str) -> ArchiveResult<T> {
    text.parse()
        .map_err(|_| ArchiveError::corrupt(path, format!("bad {} {:?}", name, text)))
}

impl RunInfo {
    pub fn write(&self, path: &Path) -> ArchiveResult<()> {
        let to_err = |source| ArchiveError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut w = std::io::BufWriter::new(std::fs::File::create(path).map_err(to_err)?);
        let exec = &self.exec;
        writeln!(w, "{}", self.command).map_err(to_err)?;
        writeln!(w, "{}", self.wrapped_command).map_err(to_err)?;
        writeln!(w, "{}", exec.submitted).map_err(to_err)?;
        writeln!(w, "{}", exec.started).map_err(to_err)?;
        writeln!(w, "{}", exec.finished).map_err(to_err)?;
        writeln!(w, "{}", exec.exited_normally as u8).map_err(to_err)?;
        writeln!(w, "{}", exec.exit_code).map_err(to_err)?;
        writeln!(w, "{}", exec.exit_signal).map_err(to_err)?;
        w.flush().map_err(to_err)
    }

    /// Reads back a record written by write().  Commands containing newlines
    /// can't be represented and come back as a corrupt record.
    pub fn read(path: &Path) -> ArchiveResult<RunInfo> {
        let text = std::fs::read_to_string(path).map_err(|err| ArchiveError::read(path, err))?;
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() != FIELDS {
            return Err(ArchiveError::corrupt(
                path,
                format!("expected {} lines, found {}", FIELDS, lines.len()),
            ));
        }
        let exited_normally = match lines[5] {
            "0" => false,
            "1" => true,
            other => {
                return Err(ArchiveError::corrupt(
                    path,
                    format!("bad exit flag {:?}", other),
                ))
            }
        };
        Ok(RunInfo {
            command: lines[0].to_string(),
            wrapped_command: lines[1].to_string(),
            exec: ExecInfo {
                submitted: parse_field(path, "submitted time", lines[2])?,
                started: parse_field(path, "start time", lines[3])?,
                finished: parse_field(path, "finish time", lines[4])?,
                exited_normally,
                exit_code: parse_field(path, "exit code", lines[6])?,
                exit_signal: parse_field(path, "exit signal", lines[7])?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunInfo {
        RunInfo {
            command: "cat a > b".into(),
            wrapped_command: "sh -c 'cat a > b'".into(),
            exec: ExecInfo {
                submitted: 100,
                started: 101,
                finished: 105,
                exited_normally: true,
                exit_code: 0,
                exit_signal: 0,
            },
        }
    }

    #[test]
    fn exact_format() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run_info");
        sample().write(&path)?;
        assert_eq!(
            std::fs::read_to_string(&path)?,
            "cat a > b\nsh -c 'cat a > b'\n100\n101\n105\n1\n0\n0\n"
        );
        assert_eq!(RunInfo::read(&path)?, sample());
        Ok(())
    }

    #[test]
    fn truncated_is_corrupt() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run_info");
        std::fs::write(&path, "cmd\ncmd\n1\n")?;
        let err = RunInfo::read(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Corrupt);

        std::fs::write(&path, "a\nb\n1\n2\n3\nyes\n0\n0\n")?;
        assert!(RunInfo::read(&path).is_err());
        Ok(())
    }
}
