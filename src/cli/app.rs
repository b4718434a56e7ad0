//! Main CLI application

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command as ClapCommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collect::{collect, export_json, task_index};
use crate::error::{ConfigError, PocketError, Result};
use crate::exec::{ExecState, Phase, TaskId};
use crate::paths::PathResolver;
use crate::runner::{Runnable, Task, TaskContext};

/// Name of the synthesized task that drives the whole pipeline.
const DEFAULT_TASK: &str = "all";

/// A project's runner configuration: the declared pipeline plus optional
/// overrides.
pub struct Config {
    /// The task tree executed by the default task.
    pub pipeline: Runnable,
    /// Project root override. Discovered from the `.git` marker when
    /// unset.
    pub root: Option<PathBuf>,
}

impl Config {
    pub fn new(pipeline: Runnable) -> Self {
        Config {
            pipeline,
            root: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

/// Run the CLI with the process argument vector. Returns the exit code;
/// callers pass it to `std::process::exit`.
pub fn run(config: Config) -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    run_with_args(config, args)
}

/// Run the CLI with an explicit argument vector (testable entry point).
pub fn run_with_args(config: Config, args: Vec<String>) -> i32 {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let matches = match parse_global_flags(args) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    let verbose = matches.get_flag("verbose");
    let help = matches.get_flag("help");
    let raw: Vec<String> = matches
        .get_many::<String>("tasks")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    let resolver = match &config.root {
        Some(root) => PathResolver::with_root(root),
        None => match PathResolver::discover() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{e}");
                return 1;
            }
        },
    };

    let collected = collect(&config.pipeline, &resolver);
    let mut index = match task_index(&collected) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    // Path mappings from the pipeline's scopes: a task named on argv runs
    // across the same directories it would cover inside the pipeline.
    let mut path_mappings: HashMap<TaskId, Vec<String>> = HashMap::new();
    for entry in &collected {
        if let Some(paths) = &entry.scope_paths {
            path_mappings
                .entry(entry.task.id())
                .or_insert_with(|| paths.clone());
        }
    }

    // The default task runs the entire pipeline, unless the configuration
    // already declares one under the same name.
    let default_task = match index.iter().find(|t| t.name() == DEFAULT_TASK) {
        Some(t) => Arc::clone(t),
        None => {
            let pipeline = config.pipeline.clone();
            let all = Task::new(DEFAULT_TASK, "run all tasks", move |ctx: TaskContext| {
                let pipeline = pipeline.clone();
                async move { ctx.run(&pipeline).await }
            })
            .as_builtin();
            index.push(Arc::clone(&all));
            all
        }
    };

    if help {
        print_help(&index, default_task.name());
        return 0;
    }

    let (selection, task_args) = match split_task_args(&raw, &index) {
        Ok(split) => split,
        Err(message) => {
            eprintln!("{message}");
            return 1;
        }
    };
    let roots = if selection.is_empty() {
        vec![Arc::clone(&default_task)]
    } else {
        selection
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return 1;
        }
    };
    runtime.block_on(execute(roots, path_mappings, task_args, &resolver, verbose))
}

/// Export the task tree as the JSON document consumed by CI matrix
/// generators. Collect phase only: no task action, command or do body
/// runs.
pub fn export(config: &Config) -> Result<String> {
    let resolver = match &config.root {
        Some(root) => PathResolver::with_root(root),
        None => PathResolver::discover()?,
    };
    export_json(&config.pipeline, &resolver)
}

async fn execute(
    roots: Vec<Arc<Task>>,
    path_mappings: HashMap<TaskId, Vec<String>>,
    task_args: HashMap<String, Vec<String>>,
    resolver: &PathResolver,
    verbose: bool,
) -> i32 {
    let cancel = CancellationToken::new();
    spawn_signal_watcher(cancel.clone());

    let state = ExecState::new(resolver.root(), Phase::Execute)
        .with_verbose(verbose)
        .with_task_args(task_args)
        .with_cancel(cancel.clone())
        .with_cwd(resolver.initial_cwd());

    for task in &roots {
        debug!(task = task.name(), "running root task");
        let branch = match path_mappings.get(&task.id()) {
            Some(paths) => state.clone().with_scope_paths(Arc::new(paths.clone())),
            None => state.clone(),
        };
        let root = Runnable::from(Arc::clone(task));
        if let Err(err) = root.run(&branch).await {
            eprintln!(
                "{}",
                PocketError::Task {
                    name: task.name().to_string(),
                    source: err,
                }
            );
            return 1;
        }
    }
    if cancel.is_cancelled() {
        eprintln!("cancelled");
        return 1;
    }
    0
}

fn parse_global_flags(args: Vec<String>) -> std::result::Result<clap::ArgMatches, clap::Error> {
    ClapCommand::new("pok")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .help("verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .help("show help")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tasks")
                .num_args(0..)
                .allow_hyphen_values(true)
                .trailing_var_arg(true),
        )
        .try_get_matches_from(std::iter::once("pok".to_string()).chain(args))
}

/// Split the trailing argument vector into the ordered task selection and
/// the raw per-task flag map. A flag token belongs to the task named
/// before it; value-taking flags consume the following token.
fn split_task_args(
    raw: &[String],
    index: &[Arc<Task>],
) -> std::result::Result<(Vec<Arc<Task>>, HashMap<String, Vec<String>>), ConfigError> {
    let mut selection: Vec<Arc<Task>> = Vec::new();
    let mut task_args: HashMap<String, Vec<String>> = HashMap::new();

    let mut tokens = raw.iter().peekable();
    while let Some(token) = tokens.next() {
        if let Some(flag) = token.strip_prefix('-') {
            let Some(current) = selection.last() else {
                return Err(ConfigError::FlagBeforeTask(token.clone()));
            };
            let args = task_args.entry(current.name().to_string()).or_default();
            args.push(token.clone());

            let flag = flag.strip_prefix('-').unwrap_or(flag);
            let bare = flag.split_once('=').is_none();
            let takes_value = current.schema().flag_takes_value(flag) == Some(true);
            if bare && takes_value {
                if let Some(value) = tokens.next() {
                    args.push(value.clone());
                }
            }
            continue;
        }
        match index.iter().find(|t| t.name() == token.as_str()) {
            Some(task) => selection.push(Arc::clone(task)),
            None => return Err(ConfigError::UnknownTask(token.clone())),
        }
    }
    Ok((selection, task_args))
}

fn print_help(index: &[Arc<Task>], default_name: &str) {
    println!("Usage: pok [flags] [task...]");
    println!();
    println!("Flags:");
    println!("  -h    show help");
    println!("  -v    verbose output");
    println!();
    println!("Tasks:");

    let mut visible: Vec<&Arc<Task>> = index.iter().filter(|t| !t.is_hidden()).collect();
    visible.sort_by_key(|t| t.name());

    let width = visible.iter().map(|t| t.name().len()).max().unwrap_or(0);
    for task in visible {
        let mark = if task.name() == default_name {
            " (default)"
        } else {
            ""
        };
        println!("  {:width$}  {}{}", task.name(), task.usage(), mark);
    }
}

fn spawn_signal_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        debug!("interrupt received, cancelling execution");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
