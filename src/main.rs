use anyhow::{anyhow, bail};
use argh::FromArgs;
use jobarchive::graph::{Graph, Task};
use jobarchive::hash::{self, Hash, Memo};
use jobarchive::layout::{Layout, OUTPUTS_DIR};
use jobarchive::run_info::RunInfo;
use jobarchive::{dedup, lineage, Archive, Config};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(FromArgs)]
/// Inspect a workflow result archive.
struct Args {
    /// chdir before running
    #[argh(option, short = 'C')]
    chdir: Option<PathBuf>,

    /// log what is being done
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Hash(HashArgs),
    TaskId(TaskIdArgs),
    Show(ShowArgs),
    Lineage(LineageArgs),
    Locate(LocateArgs),
    Restore(RestoreArgs),
}

#[derive(FromArgs)]
/// print the content hash of files
#[argh(subcommand, name = "hash")]
struct HashArgs {
    #[argh(positional)]
    files: Vec<PathBuf>,
}

#[derive(FromArgs)]
/// print the archive id a task with these inputs would have
#[argh(subcommand, name = "task-id")]
struct TaskIdArgs {
    /// command line of the task
    #[argh(option, short = 'c')]
    command: String,

    /// command line as submitted, if different [default=command]
    #[argh(option, short = 'w')]
    wrapped: Option<String>,

    /// input files, in declaration order
    #[argh(positional)]
    inputs: Vec<String>,
}

#[derive(FromArgs)]
/// print the run record and outputs of an archived task
#[argh(subcommand, name = "show")]
struct ShowArgs {
    /// archive directory
    #[argh(option, short = 'a')]
    archive: PathBuf,

    #[argh(positional)]
    id: String,
}

#[derive(FromArgs)]
/// print the ancestors and descendants of an archived task
#[argh(subcommand, name = "lineage")]
struct LineageArgs {
    /// archive directory
    #[argh(option, short = 'a')]
    archive: PathBuf,

    #[argh(positional)]
    id: String,
}

#[derive(FromArgs)]
/// print where content with the given hash is archived
#[argh(subcommand, name = "locate")]
struct LocateArgs {
    /// archive directory
    #[argh(option, short = 'a')]
    archive: PathBuf,

    #[argh(positional)]
    hash: String,
}

#[derive(FromArgs)]
/// copy archived outputs of a task into the current directory
#[argh(subcommand, name = "restore")]
struct RestoreArgs {
    /// archive directory
    #[argh(option, short = 'a')]
    archive: PathBuf,

    #[argh(positional)]
    id: String,

    #[argh(positional)]
    outputs: Vec<String>,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "jobarchive=info"
    } else {
        "jobarchive=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn list_outputs(dir: &Path, prefix: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = prefix.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            list_outputs(&entry.path(), &name, out)?;
        } else {
            out.push(name);
        }
    }
    Ok(())
}

fn show(args: ShowArgs) -> anyhow::Result<()> {
    let id: Hash = args.id.parse()?;
    let layout = Layout::new(args.archive);
    let info = RunInfo::read(&layout.run_info(&id))?;
    println!("command:   {}", info.command);
    println!("wrapped:   {}", info.wrapped_command);
    println!("submitted: {}", info.exec.submitted);
    println!("started:   {}", info.exec.started);
    println!("finished:  {}", info.exec.finished);
    if info.exec.exited_normally {
        println!("exit code: {}", info.exec.exit_code);
    } else {
        println!("signal:    {}", info.exec.exit_signal);
    }
    let mut outputs = Vec::new();
    list_outputs(
        &layout.job_dir(&id).join(OUTPUTS_DIR),
        Path::new(""),
        &mut outputs,
    )?;
    outputs.sort();
    for output in outputs {
        println!("output:    {}", output.display());
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    if let Some(dir) = &args.chdir {
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }

    match args.command {
        Command::Hash(args) => {
            for file in args.files {
                println!("{}  {}", hash::content_hash(&file)?, file.display());
            }
        }
        Command::TaskId(args) => {
            let mut graph = Graph::new();
            let ins: Vec<_> = args.inputs.iter().map(|name| graph.file_id(name)).collect();
            let task = graph.add_task(Task::new(args.command.clone(), ins.clone(), Vec::new()));
            let wrapped = args.wrapped.as_deref().unwrap_or(&args.command);
            let id = hash::task_id(&mut graph, Path::new("."), task, wrapped, &ins)?;
            println!("{}", id);
        }
        Command::Show(args) => show(args)?,
        Command::Lineage(args) => {
            let id: Hash = args.id.parse()?;
            let layout = Layout::new(args.archive);
            if !layout.job_dir(&id).is_dir() {
                bail!("no archived task {}", id);
            }
            for ancestor in lineage::ancestors(&layout, &id)? {
                println!("ancestor   {}", ancestor);
            }
            for descendant in lineage::descendants(&layout, &id)? {
                println!("descendant {}", descendant);
            }
        }
        Command::Locate(args) => {
            let hash: Hash = args.hash.parse()?;
            match dedup::resolve(&Layout::new(args.archive), &hash)? {
                Some(path) => println!("{}", path.display()),
                None => bail!("no archived file with hash {}", hash),
            }
        }
        Command::Restore(args) => {
            let id: Hash = args.id.parse()?;
            // Opening creates the archive, so check for the entry first.
            if !Layout::new(args.archive.clone()).job_dir(&id).is_dir() {
                bail!("no archived task {}", id);
            }
            // Restoring never touches the workflow file.
            let archive = Archive::open(Config::new(args.archive, PathBuf::new()))?;
            let mut graph = Graph::new();
            let outs: Vec<_> = args.outputs.iter().map(|name| graph.file_id(name)).collect();
            let task = graph.add_task(Task::new(format!("restore {}", id), Vec::new(), outs.clone()));
            graph.task_mut(task).archive_id = Memo::Computed(id);
            let wrapped = graph.task(task).command.clone();
            if !archive.is_preserved(&mut graph, task, &wrapped, &[], &outs)? {
                bail!("task {} is not fully archived", id);
            }
            archive.copy_preserved_files(&graph, task, &outs)?;
        }
    }
    Ok(())
}

fn main() {
    let args: Args = argh::from_env();
    init_logging(args.verbose);
    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("jobarchive: error: {}", err);
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
