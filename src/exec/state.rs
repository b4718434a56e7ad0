//! Execution state threaded through the runnable tree

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::options::Values;

use super::dedup::DedupRegistry;
use super::output::OutputSink;

/// Which traversal is running. Collect enumerates the tree without
/// executing side-effectful leaves; execute runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collect,
    Execute,
}

/// A `(task, paths?)` tuple suppressing execution, either globally for the
/// task or only in the named paths.
#[derive(Debug, Clone)]
pub struct SkipRule {
    task: String,
    paths: Vec<String>,
}

impl SkipRule {
    /// Skip the task everywhere.
    pub fn global(task: impl Into<String>) -> Self {
        SkipRule {
            task: task.into(),
            paths: Vec::new(),
        }
    }

    /// Skip the task only in the given paths.
    pub fn in_paths<I, S>(task: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SkipRule {
            task: task.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    fn is_global(&self) -> bool {
        self.paths.is_empty()
    }

    fn matches(&self, task: &str, path: Option<&str>) -> bool {
        if self.task != task {
            return false;
        }
        match path {
            // Global query: only a global rule applies.
            None => self.is_global(),
            Some(p) => self.is_global() || self.paths.iter().any(|s| s == p),
        }
    }
}

/// Execution-wide shared core. Immutable for the lifetime of the run,
/// apart from the registry's interior completion map.
struct Shared {
    registry: DedupRegistry,
    task_args: HashMap<String, Vec<String>>,
    root: PathBuf,
    phase: Phase,
    verbose: bool,
    cancel: CancellationToken,
}

/// Per-execution context handed to every node of the runnable tree.
///
/// Cloning is cheap: the execution-wide core sits behind an `Arc`, while
/// the branch-local fields (`cwd`, scope paths, skip rules, sink, bound
/// options) are rebound by the `with_*` copies as composition descends.
#[derive(Clone)]
pub struct ExecState {
    shared: Arc<Shared>,
    cwd: String,
    scope_paths: Option<Arc<Vec<String>>>,
    skip: Arc<Vec<SkipRule>>,
    out: OutputSink,
    opts: Option<Values>,
}

impl ExecState {
    pub fn new(root: impl Into<PathBuf>, phase: Phase) -> Self {
        ExecState {
            shared: Arc::new(Shared {
                registry: DedupRegistry::new(),
                task_args: HashMap::new(),
                root: root.into(),
                phase,
                verbose: false,
                cancel: CancellationToken::new(),
            }),
            cwd: ".".to_string(),
            scope_paths: None,
            skip: Arc::new(Vec::new()),
            out: OutputSink::Standard,
            opts: None,
        }
    }

    /// Builder used at run entry; panics if called after the state was
    /// shared (it never is: the CLI configures before dispatching).
    fn shared_mut(&mut self) -> &mut Shared {
        Arc::get_mut(&mut self.shared).expect("ExecState still being configured")
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.shared_mut().verbose = verbose;
        self
    }

    pub fn with_task_args(mut self, task_args: HashMap<String, Vec<String>>) -> Self {
        self.shared_mut().task_args = task_args;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.shared_mut().cancel = cancel;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_out(mut self, out: OutputSink) -> Self {
        self.out = out;
        self
    }

    pub(crate) fn with_scope_paths(mut self, paths: Arc<Vec<String>>) -> Self {
        self.scope_paths = Some(paths);
        self
    }

    pub(crate) fn with_skip_rules(mut self, rules: &[SkipRule]) -> Self {
        if rules.is_empty() {
            return self;
        }
        let mut merged = (*self.skip).clone();
        merged.extend_from_slice(rules);
        self.skip = Arc::new(merged);
        self
    }

    pub(crate) fn with_opts(mut self, opts: Values) -> Self {
        self.opts = Some(opts);
        self
    }

    pub fn registry(&self) -> &DedupRegistry {
        &self.shared.registry
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase
    }

    pub fn verbose(&self) -> bool {
        self.shared.verbose
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Request cancellation of the whole execution.
    pub fn request_cancel(&self) {
        self.shared.cancel.cancel();
    }

    /// Current working directory, relative to the project root.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Resolved path list of the innermost enclosing path scope.
    pub(crate) fn scope_paths(&self) -> Option<&[String]> {
        self.scope_paths.as_deref().map(Vec::as_slice)
    }

    pub fn out(&self) -> &OutputSink {
        &self.out
    }

    /// Bound option values of the innermost task, for command arg thunks.
    pub fn opts(&self) -> Values {
        self.opts.clone().unwrap_or_default()
    }

    /// Raw argv slice parked for a task by the CLI splitter.
    pub(crate) fn task_args(&self, task: &str) -> &[String] {
        self.shared
            .task_args
            .get(task)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether a skip rule suppresses the task. `path == None` queries
    /// global rules only.
    pub fn is_skipped(&self, task: &str, path: Option<&str>) -> bool {
        self.skip.iter().any(|rule| rule.matches(task, path))
    }
}
