//! A content-addressed archive of workflow task results.
//!
//! Finished tasks are stored under an id derived from their command and the
//! contents of their inputs, so a later run of the same workflow can find and
//! restore their outputs instead of running them again.

pub mod archive;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fs;
pub mod graph;
pub mod hash;
pub mod layout;
pub mod lineage;
pub mod run_info;
pub mod work;

pub use archive::Archive;
pub use config::{Config, DedupCheck};
pub use error::{ArchiveError, ArchiveResult, ErrorKind};
