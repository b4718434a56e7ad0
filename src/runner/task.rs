//! Task definitions, the task runtime context, and the task driver

use std::path::Path;
use std::sync::Arc;

use futures::future::{BoxFuture, Future, FutureExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{TaskError, TaskResult};
use crate::exec::{Acquired, DedupRegistry, ExecState, OutputSink, Phase, TaskId};
use crate::options::{Schema, Values};

use super::runnable::Runnable;

type ActionFn = Arc<dyn Fn(TaskContext) -> BoxFuture<'static, TaskResult> + Send + Sync>;

/// A named, optionally-parameterized unit of work.
///
/// Definitions are immutable and shared by reference: the same `Arc<Task>`
/// may appear under multiple parents, and the engine treats repeated
/// references as dedup-equivalent. The `with_*` builders return copies
/// with their own identity.
pub struct Task {
    name: String,
    usage: String,
    schema: Schema,
    action: Option<ActionFn>,
    body: Option<Runnable>,
    hidden: bool,
    builtin: bool,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("hidden", &self.hidden)
            .field("builtin", &self.builtin)
            .finish()
    }
}

impl Task {
    /// Create a task from an async action. The action is opaque to the
    /// collect walker; tasks it reaches by call are not enumerable.
    pub fn new<F, Fut>(name: impl Into<String>, usage: impl Into<String>, action: F) -> Arc<Task>
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Arc::new(Task {
            name: name.into(),
            usage: usage.into(),
            schema: Schema::empty(),
            action: Some(Arc::new(move |ctx| action(ctx).boxed())),
            body: None,
            hidden: false,
            builtin: false,
        })
    }

    /// Create a task from a composed body, run once per live path with the
    /// working directory rebound to each path in turn. Unlike a closure
    /// action, the body stays visible to the collect walker, so nested
    /// tasks (tool installers, say) are enumerable and addressable.
    pub fn from_runnable(
        name: impl Into<String>,
        usage: impl Into<String>,
        body: Runnable,
    ) -> Arc<Task> {
        Arc::new(Task {
            name: name.into(),
            usage: usage.into(),
            schema: Schema::empty(),
            action: None,
            body: Some(body),
            hidden: false,
            builtin: false,
        })
    }

    /// Copy with an options schema attached. Parsed values reach the action
    /// through [`TaskContext::opts`].
    pub fn with_options(&self, schema: Schema) -> Arc<Task> {
        let mut copy = self.copy();
        copy.schema = schema;
        Arc::new(copy)
    }

    /// Copy under a different CLI name. Lets the same work appear under a
    /// distinct name, e.g. exposing a skipped pipeline task separately.
    pub fn with_name(&self, name: impl Into<String>) -> Arc<Task> {
        let mut copy = self.copy();
        copy.name = name.into();
        Arc::new(copy)
    }

    /// Copy with different help text.
    pub fn with_usage(&self, usage: impl Into<String>) -> Arc<Task> {
        let mut copy = self.copy();
        copy.usage = usage.into();
        Arc::new(copy)
    }

    /// Copy excluded from help output. Hidden tasks still execute.
    pub fn as_hidden(&self) -> Arc<Task> {
        let mut copy = self.copy();
        copy.hidden = true;
        Arc::new(copy)
    }

    /// Copy marked as a system task.
    pub fn as_builtin(&self) -> Arc<Task> {
        let mut copy = self.copy();
        copy.builtin = true;
        Arc::new(copy)
    }

    fn copy(&self) -> Task {
        Task {
            name: self.name.clone(),
            usage: self.usage.clone(),
            schema: self.schema.clone(),
            action: self.action.clone(),
            body: self.body.clone(),
            hidden: self.hidden,
            builtin: self.builtin,
        }
    }

    /// The composed body, if this task was built from one.
    pub(crate) fn body(&self) -> Option<&Runnable> {
        self.body.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Identity of this definition within an execution. Definitions are
    /// only ever handed out inside an `Arc`, so the address of `self` is
    /// the allocation's address.
    pub fn id(&self) -> TaskId {
        TaskId(self as *const Task as usize)
    }
}

/// Runtime context handed to a task's action.
pub struct TaskContext {
    paths: Vec<String>,
    opts: Values,
    state: ExecState,
}

impl TaskContext {
    /// The live (skip-filtered) path list for this invocation.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Parsed option values, defaults applied.
    pub fn opts(&self) -> &Values {
        &self.opts
    }

    pub fn out(&self) -> &OutputSink {
        self.state.out()
    }

    pub fn verbose(&self) -> bool {
        self.state.verbose()
    }

    pub fn root(&self) -> &Path {
        self.state.root()
    }

    pub fn cwd(&self) -> &str {
        self.state.cwd()
    }

    pub fn cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.state.cancel().clone()
    }

    /// Re-enter the engine on another runnable with this task's state.
    /// Dedup still holds: a sibling task invoked this way runs at most
    /// once across the execution.
    pub async fn run(&self, runnable: &Runnable) -> TaskResult {
        runnable.run(&self.state).await
    }

    /// Like [`TaskContext::run`], with the working directory rebound.
    pub async fn run_in(&self, path: &str, runnable: &Runnable) -> TaskResult {
        let state = self.state.clone().with_cwd(path);
        runnable.run(&state).await
    }

    /// Run `f` for each live path, checking cancellation between
    /// iterations.
    pub async fn for_each_path<F, Fut>(&self, mut f: F) -> TaskResult
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = TaskResult>,
    {
        for path in &self.paths {
            if self.cancelled() {
                return Err(TaskError::Cancelled);
            }
            f(path.clone()).await?;
        }
        Ok(())
    }
}

/// Execute a task under the dedup discipline: the first arrival runs the
/// action, everyone else receives the recorded result.
pub(crate) async fn run_task(task: &Arc<Task>, state: &ExecState) -> TaskResult {
    match state.registry().mark_and_acquire(task.id()) {
        Acquired::Done(result) => result,
        Acquired::Waiting(rx) => DedupRegistry::wait(rx).await,
        Acquired::Runner(token) => {
            let result = drive(task, state).await;
            state.registry().commit(token, result)
        }
    }
}

async fn drive(task: &Arc<Task>, state: &ExecState) -> TaskResult {
    let name = task.name();

    if state.is_skipped(name, None) {
        debug!(task = name, "globally skipped");
        return Ok(());
    }

    // Path list from the enclosing scope, defaulting to the current
    // working directory.
    let paths: Vec<String> = match state.scope_paths() {
        Some(paths) => paths.to_vec(),
        None => vec![state.cwd().to_string()],
    };
    let (live, skipped): (Vec<String>, Vec<String>) = paths
        .into_iter()
        .partition(|p| !state.is_skipped(name, Some(p.as_str())));

    let out = state.out();
    if live.is_empty() {
        out.line(&format!("=== {name} (skipped)"));
        return Ok(());
    }
    if skipped.is_empty() {
        out.line(&format!("=== {name}"));
    } else {
        out.line(&format!("=== {name} (skipped in: {})", skipped.join(", ")));
    }

    if state.phase() == Phase::Collect {
        return Ok(());
    }

    let opts = task.schema().parse(state.task_args(name))?;

    debug!(task = name, paths = live.len(), "running task");
    let ctx = TaskContext {
        paths: live,
        opts: opts.clone(),
        state: state.clone().with_opts(opts),
    };
    match (&task.action, &task.body) {
        (Some(action), _) => (**action)(ctx).await,
        (None, Some(body)) => {
            for path in ctx.paths().to_vec() {
                if ctx.cancelled() {
                    return Err(TaskError::Cancelled);
                }
                ctx.run_in(&path, body).await?;
            }
            Ok(())
        }
        (None, None) => Ok(()),
    }
}
