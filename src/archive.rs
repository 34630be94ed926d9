//! Archiving finished tasks, and reusing archived results.
//!
//! A task's entry is keyed by its archive id (see hash::task_id).  Writing an
//! entry is not transactional: a failure part way leaves a partial entry that
//! later calls must cope with.  Lookups only count an entry as a hit when all
//! of its outputs are present, so a partial entry is simply a miss.

use crate::config::{Config, DedupCheck};
use crate::error::{ArchiveError, ArchiveResult};
use crate::fs::{self, Stat};
use crate::graph::{FileId, Graph, TaskId};
use crate::hash::{self, Hash};
use crate::layout::{Layout, ANCESTORS_DIR, DESCENDANTS_DIR, INPUTS_DIR, OUTPUTS_DIR};
use crate::run_info::{ExecInfo, RunInfo};
use crate::{dedup, lineage};
use std::path::PathBuf;
use tracing::{debug, info};

pub struct Archive {
    layout: Layout,
    workflow_file: PathBuf,
    work_dir: PathBuf,
    dedup: DedupCheck,
}

impl Archive {
    /// Opens (creating if needed) the archive described by `config`.  The
    /// archive root is made absolute, as links between entries point at
    /// absolute paths.
    pub fn open(config: Config) -> ArchiveResult<Archive> {
        let root = if config.archive_dir.is_absolute() {
            config.archive_dir
        } else {
            let cwd = std::env::current_dir().map_err(|err| ArchiveError::read(".", err))?;
            cwd.join(config.archive_dir)
        };
        let layout = Layout::new(root);
        fs::create_dir(&layout.jobs_dir())?;
        fs::create_dir(&layout.files_dir())?;
        debug!("opened archive at {:?}", layout.root());
        Ok(Archive {
            layout,
            workflow_file: config.workflow_file,
            work_dir: config.work_dir,
            dedup: config.dedup,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The archive id of `task`, computed on first use.
    pub fn task_id(
        &self,
        graph: &mut Graph,
        task: TaskId,
        wrapped_command: &str,
        inputs: &[FileId],
    ) -> ArchiveResult<Hash> {
        hash::task_id(graph, &self.work_dir, task, wrapped_command, inputs)
    }

    fn known_id(&self, graph: &Graph, task: TaskId) -> ArchiveResult<Hash> {
        let t = graph.task(task);
        t.archive_id.get().ok_or_else(|| ArchiveError::UnknownTaskId {
            command: t.command.clone(),
        })
    }

    fn ancestor_id(&self, graph: &Graph, task: TaskId, ancestor: TaskId) -> ArchiveResult<Hash> {
        graph
            .task(ancestor)
            .archive_id
            .get()
            .ok_or_else(|| ArchiveError::AncestorNotArchived {
                command: graph.task(task).command.clone(),
            })
    }

    /// Stores a finished task's outputs, inputs, run record and lineage in
    /// the archive, returning its archive id.
    ///
    /// Ancestors of `task` must have been archived already.
    pub fn populate(
        &self,
        graph: &mut Graph,
        task: TaskId,
        wrapped_command: &str,
        inputs: &[FileId],
        outputs: &[FileId],
        exec: &ExecInfo,
    ) -> ArchiveResult<Hash> {
        let id = self.task_id(graph, task, wrapped_command, inputs)?;
        let job_dir = self.layout.job_dir(&id);

        for sub in &[OUTPUTS_DIR, INPUTS_DIR, ANCESTORS_DIR, DESCENDANTS_DIR] {
            fs::create_dir(&job_dir.join(sub))?;
        }

        RunInfo {
            command: graph.task(task).command.clone(),
            wrapped_command: wrapped_command.to_string(),
            exec: exec.clone(),
        }
        .write(&self.layout.run_info(&id))?;

        self.write_outputs(graph, &id, outputs)?;

        if graph.task(task).is_root() {
            fs::copy_new(&self.workflow_file, &self.layout.source_workflow(&id))?;
        }

        for &ancestor in graph.task(task).ancestors() {
            let ancestor_id = self.ancestor_id(graph, task, ancestor)?;
            lineage::link(&self.layout, &id, &ancestor_id)?;
        }

        self.write_inputs(graph, task, &id)?;

        info!("archived {} at {:?}", graph.task(task).command, job_dir);
        Ok(id)
    }

    fn write_outputs(&self, graph: &mut Graph, id: &Hash, outputs: &[FileId]) -> ArchiveResult<()> {
        for &out in outputs {
            let name = graph.file(out).name.clone();
            let archived = self.layout.output(id, &name)?;
            // An archived output is never rewritten; index whatever it holds.
            let content = if fs::copy_new(&self.work_dir.join(&name), &archived)? {
                hash::file_hash(graph, &self.work_dir, out)?
            } else {
                debug!("{:?} already archived", archived);
                hash::content_hash(&archived)?
            };
            dedup::register(&self.layout, self.dedup, &content, &archived)?;
            graph.file_mut(out).archive_path = Some(archived);
        }
        Ok(())
    }

    /// Archives the task's declared inputs.  Inputs from outside the workflow
    /// are copied into the first entry that uses them; everything else links
    /// to its canonical archived copy.
    fn write_inputs(&self, graph: &mut Graph, task: TaskId, id: &Hash) -> ArchiveResult<()> {
        let ins = graph.task(task).ins().to_vec();
        for input in ins {
            let file = graph.file(input);
            let name = file.name.clone();
            let recorded = file.archive_path.clone();
            let producer = file.created_by;
            let archived = self.layout.input(id, &name)?;
            let canonical = match (recorded, producer) {
                (None, None) => {
                    fs::copy_new(&self.work_dir.join(&name), &archived)?;
                    graph.file_mut(input).archive_path = Some(archived);
                    continue;
                }
                (Some(canonical), _) => canonical,
                (None, Some(producer)) => {
                    let producer_id = self.ancestor_id(graph, task, producer)?;
                    self.layout.output(&producer_id, &name)?
                }
            };
            fs::symlink_file(&canonical, &archived)?;
            graph.file_mut(input).archive_path = Some(canonical);
        }
        Ok(())
    }

    /// Reports whether every output of `task` is present in the archive.
    /// A task with some but not all outputs archived is a miss.
    pub fn is_preserved(
        &self,
        graph: &mut Graph,
        task: TaskId,
        wrapped_command: &str,
        inputs: &[FileId],
        outputs: &[FileId],
    ) -> ArchiveResult<bool> {
        let id = self.task_id(graph, task, wrapped_command, inputs)?;
        for &out in outputs {
            let archived = self.layout.output(&id, &graph.file(out).name)?;
            if fs::stat(&archived)? == Stat::Missing {
                debug!("{:?} not archived", archived);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Copies a preserved task's archived outputs into the working directory,
    /// replacing whatever is there.  Call only after is_preserved() returned
    /// true for this task; a failure here means the entry is corrupt.
    pub fn copy_preserved_files(
        &self,
        graph: &Graph,
        task: TaskId,
        outputs: &[FileId],
    ) -> ArchiveResult<()> {
        let id = self.known_id(graph, task)?;
        for &out in outputs {
            let name = &graph.file(out).name;
            let archived = self.layout.output(&id, name)?;
            fs::copy(&archived, &self.work_dir.join(name)).map_err(|err| {
                ArchiveError::corrupt(&archived, format!("could not restore {}: {}", name, err))
            })?;
        }
        info!("restored {} from {:?}", graph.task(task).command, self.layout.job_dir(&id));
        Ok(())
    }
}
