//! The closed set of composable nodes

use std::sync::Arc;

use futures::future::{BoxFuture, Future, FutureExt};

use crate::error::TaskResult;
use crate::exec::{ExecState, Phase};

use super::command::Command;
use super::compose::{run_parallel, run_serial};
use super::scope::PathScope;
use super::task::{run_task, Task};

type DoFn = Arc<dyn Fn(ExecState) -> BoxFuture<'static, TaskResult> + Send + Sync>;

/// Anything that can be executed or enumerated.
///
/// The set of variants is closed: new behaviors compose from these rather
/// than adding shapes, so the collect walker never has to learn new ones.
#[derive(Clone)]
pub enum Runnable {
    /// A named task, deduplicated per execution.
    Task(Arc<Task>),
    /// Children in declared order; stops at the first failure.
    Serial(Vec<Runnable>),
    /// Children concurrently; first failure cancels the siblings.
    Parallel(Vec<Runnable>),
    /// A child iterated over a resolved path list.
    Scope(Box<PathScope>),
    /// An external command.
    Command(Command),
    /// Arbitrary user code.
    Do(DoFn),
}

/// Sequential composition. The first child failure is returned and the
/// remaining children are not started.
pub fn serial(children: impl Into<Vec<Runnable>>) -> Runnable {
    Runnable::Serial(children.into())
}

/// Concurrent composition. All children start; the combinator waits for
/// every child to terminate before returning.
pub fn parallel(children: impl Into<Vec<Runnable>>) -> Runnable {
    Runnable::Parallel(children.into())
}

/// Arbitrary user code as a leaf. Not invoked in collect phase.
pub fn run_fn<F, Fut>(f: F) -> Runnable
where
    F: Fn(ExecState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    Runnable::Do(Arc::new(move |state| f(state).boxed()))
}

impl From<Arc<Task>> for Runnable {
    fn from(task: Arc<Task>) -> Self {
        Runnable::Task(task)
    }
}

impl From<PathScope> for Runnable {
    fn from(scope: PathScope) -> Self {
        Runnable::Scope(Box::new(scope))
    }
}

impl From<Command> for Runnable {
    fn from(command: Command) -> Self {
        Runnable::Command(command)
    }
}

impl Runnable {
    /// Execute this node under the given state.
    pub fn run<'a>(&'a self, state: &'a ExecState) -> BoxFuture<'a, TaskResult> {
        match self {
            Runnable::Task(task) => run_task(task, state).boxed(),
            Runnable::Serial(children) => run_serial(children, state).boxed(),
            Runnable::Parallel(children) => run_parallel(children, state).boxed(),
            Runnable::Scope(scope) => scope.run(state).boxed(),
            Runnable::Command(command) => command.run(state).boxed(),
            Runnable::Do(body) => run_do(body, state).boxed(),
        }
    }
}

async fn run_do(body: &DoFn, state: &ExecState) -> TaskResult {
    if state.phase() == Phase::Collect {
        return Ok(());
    }
    (**body)(state.clone()).await
}
