//! The workflow graph, a graph between files and the tasks producing them.
//!
//! The archive only reads this graph and annotates it with hashes and
//! archive locations; tasks and files refer to each other by id, never by
//! reference.

use crate::hash::Memo;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);
impl FileId {
    fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);
impl TaskId {
    fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct File {
    pub name: String,
    /// Hash of the file's bytes, computed on first need.
    pub content_hash: Memo,
    /// Where the canonical archived copy of this file lives, once known.
    pub archive_path: Option<PathBuf>,
    /// The task producing this file; None for inputs supplied from outside
    /// the workflow.
    pub created_by: Option<TaskId>,
}

#[derive(Debug)]
pub struct Task {
    pub command: String,
    pub archive_id: Memo,
    ins: Vec<FileId>,
    outs: Vec<FileId>,
    ancestors: Vec<TaskId>,
}

impl Task {
    pub fn new(command: impl Into<String>, ins: Vec<FileId>, outs: Vec<FileId>) -> Self {
        Task {
            command: command.into(),
            archive_id: Memo::Unset,
            ins,
            outs,
            ancestors: Vec::new(),
        }
    }

    /// Input files, in declaration order.  The order feeds the task's hash.
    pub fn ins(&self) -> &[FileId] {
        &self.ins
    }

    pub fn outs(&self) -> &[FileId] {
        &self.outs
    }

    /// Direct predecessors, without duplicates.
    pub fn ancestors(&self) -> &[TaskId] {
        &self.ancestors
    }

    pub fn is_root(&self) -> bool {
        self.ancestors.is_empty()
    }

    fn add_ancestor(&mut self, id: TaskId) {
        if !self.ancestors.contains(&id) {
            self.ancestors.push(id);
        }
    }
}

#[derive(Default)]
pub struct Graph {
    files: Vec<File>,
    tasks: Vec<Task>,
    file_to_id: FxHashMap<String, FileId>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Look up a file by name, adding it if it's new.
    pub fn file_id(&mut self, name: &str) -> FileId {
        if let Some(&id) = self.file_to_id.get(name) {
            return id;
        }
        let id = FileId(self.files.len());
        self.files.push(File {
            name: name.to_string(),
            content_hash: Memo::Unset,
            archive_path: None,
            created_by: None,
        });
        self.file_to_id.insert(name.to_string(), id);
        id
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.index()]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut File {
        &mut self.files[id.index()]
    }

    /// Adds a task, linking its outputs back to it and recording the tasks
    /// producing its inputs as its ancestors.
    pub fn add_task(&mut self, mut task: Task) -> TaskId {
        let id = TaskId(self.tasks.len());
        for &out in &task.outs {
            let f = &mut self.files[out.index()];
            match f.created_by {
                Some(other) => panic!("double link {:?}: {:?} and {:?}", f.name, other, id),
                None => f.created_by = Some(id),
            }
        }
        let producers: Vec<TaskId> = task
            .ins
            .iter()
            .filter_map(|inf| self.files[inf.index()].created_by)
            .collect();
        for producer in producers {
            task.add_ancestor(producer);
        }
        self.tasks.push(task);
        id
    }

    /// Adds an ordering edge that isn't expressed through files.
    pub fn add_ancestor(&mut self, id: TaskId, ancestor: TaskId) {
        self.tasks[id.index()].add_ancestor(ancestor);
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id.index()]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.index()]
    }
}
