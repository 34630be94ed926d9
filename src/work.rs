//! Drives archive lookups and writes for a workflow run, deciding per failure
//! whether the run stops or the task just goes uncached.

use crate::archive::Archive;
use crate::error::{ArchiveError, ArchiveResult, ErrorKind};
use crate::graph::{Graph, TaskId};
use crate::hash::Hash;
use crate::run_info::ExecInfo;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

/// What to do about a failed archive operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Action {
    /// Stop the run, returning the error.
    Abort,
    /// Carry on as if the task weren't cached.
    Skip,
}

/// Maps each kind of archive failure to an Action.
#[derive(Debug, Clone)]
pub struct Policy {
    actions: FxHashMap<ErrorKind, Action>,
    default: Action,
}

impl Default for Policy {
    fn default() -> Self {
        Policy::strict()
    }
}

impl Policy {
    /// Every failure stops the run.
    pub fn strict() -> Self {
        Policy {
            actions: FxHashMap::default(),
            default: Action::Abort,
        }
    }

    /// Only unreadable inputs stop the run; any other failure leaves the
    /// affected task uncached.
    pub fn keep_going() -> Self {
        Policy {
            actions: FxHashMap::default(),
            default: Action::Skip,
        }
        .with(ErrorKind::Read, Action::Abort)
    }

    pub fn with(mut self, kind: ErrorKind, action: Action) -> Self {
        self.actions.insert(kind, action);
        self
    }

    pub fn action(&self, err: &ArchiveError) -> Action {
        self.actions
            .get(&err.kind())
            .copied()
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Reuse {
    /// The outputs were restored from the archive; the task needn't run.
    Hit,
    Miss,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Recorded {
    Archived(Hash),
    /// Archiving failed and the policy said to carry on.
    Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub restored: usize,
    pub archived: usize,
    pub skipped: usize,
}

pub struct Work<'a> {
    archive: &'a Archive,
    graph: &'a mut Graph,
    policy: Policy,
    /// Tasks archived or restored during this run.
    done: FxHashSet<TaskId>,
    stats: Stats,
}

impl<'a> Work<'a> {
    pub fn new(archive: &'a Archive, graph: &'a mut Graph, policy: Policy) -> Self {
        Work {
            archive,
            graph,
            policy,
            done: FxHashSet::default(),
            stats: Stats::default(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    fn handle(&mut self, task: TaskId, err: ArchiveError) -> ArchiveResult<()> {
        match self.policy.action(&err) {
            Action::Abort => Err(err),
            Action::Skip => {
                warn!("not caching {:?}: {}", self.graph.task(task).command, err);
                self.stats.skipped += 1;
                Ok(())
            }
        }
    }

    fn try_reuse(&mut self, task: TaskId, wrapped_command: &str) -> ArchiveResult<Reuse> {
        let ins = self.graph.task(task).ins().to_vec();
        let outs = self.graph.task(task).outs().to_vec();
        if !self
            .archive
            .is_preserved(self.graph, task, wrapped_command, &ins, &outs)?
        {
            return Ok(Reuse::Miss);
        }
        self.archive.copy_preserved_files(self.graph, task, &outs)?;
        Ok(Reuse::Hit)
    }

    /// Restores `task`'s outputs from the archive if all of them are there.
    pub fn reuse(&mut self, task: TaskId, wrapped_command: &str) -> ArchiveResult<Reuse> {
        match self.try_reuse(task, wrapped_command) {
            Ok(Reuse::Hit) => {
                self.stats.restored += 1;
                self.done.insert(task);
                Ok(Reuse::Hit)
            }
            Ok(Reuse::Miss) => Ok(Reuse::Miss),
            Err(err) => {
                self.handle(task, err)?;
                Ok(Reuse::Miss)
            }
        }
    }

    /// Archives a task that has just finished running.
    pub fn record(
        &mut self,
        task: TaskId,
        wrapped_command: &str,
        exec: &ExecInfo,
    ) -> ArchiveResult<Recorded> {
        for &ancestor in self.graph.task(task).ancestors() {
            if !self.done.contains(&ancestor) {
                warn!(
                    "archiving {:?} before its ancestor {:?}",
                    self.graph.task(task).command,
                    self.graph.task(ancestor).command
                );
            }
        }
        let ins = self.graph.task(task).ins().to_vec();
        let outs = self.graph.task(task).outs().to_vec();
        match self
            .archive
            .populate(self.graph, task, wrapped_command, &ins, &outs, exec)
        {
            Ok(id) => {
                self.stats.archived += 1;
                self.done.insert(task);
                Ok(Recorded::Archived(id))
            }
            Err(err) => {
                self.handle(task, err)?;
                Ok(Recorded::Skipped)
            }
        }
    }
}
