//! Run-at-most-once bookkeeping per execution
//!
//! The registry memoizes task results by task identity. A task referenced
//! from several parents (two parallel branches both depending on an
//! installer, say) runs exactly once; late observers wait for the single
//! executor and receive the recorded result.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;

use crate::error::{TaskError, TaskResult};

/// Identity of a task definition within one execution. Derived from the
/// address of the `Arc<Task>` allocation, so two references to the same
/// definition share an identity while a renamed copy gets its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) usize);

enum Entry {
    Running(watch::Receiver<Option<TaskResult>>),
    Done(TaskResult),
}

/// Outcome of [`DedupRegistry::mark_and_acquire`].
pub enum Acquired {
    /// The caller owns execution; commit the result through the token.
    Runner(RunToken),
    /// Another caller already finished; this is its result.
    Done(TaskResult),
    /// Another caller is executing; wait on the receiver.
    Waiting(watch::Receiver<Option<TaskResult>>),
}

/// Commit token held by the single executor of a task.
pub struct RunToken {
    id: TaskId,
    tx: watch::Sender<Option<TaskResult>>,
}

/// Tracks which tasks have run in this execution, with their results.
#[derive(Default)]
pub struct DedupRegistry {
    entries: Mutex<HashMap<TaskId, Entry>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        DedupRegistry::default()
    }

    /// Atomically transition not-started to in-progress. Exactly one caller
    /// per task identity receives [`Acquired::Runner`].
    pub fn mark_and_acquire(&self, id: TaskId) -> Acquired {
        let mut entries = match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(&id) {
            Some(Entry::Done(result)) => Acquired::Done(result.clone()),
            Some(Entry::Running(rx)) => Acquired::Waiting(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                entries.insert(id, Entry::Running(rx));
                Acquired::Runner(RunToken { id, tx })
            }
        }
    }

    /// Record the result and wake every waiter. Returns the result for
    /// convenience.
    pub fn commit(&self, token: RunToken, result: TaskResult) -> TaskResult {
        {
            let mut entries = match self.entries.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            entries.insert(token.id, Entry::Done(result.clone()));
        }
        let _ = token.tx.send(Some(result.clone()));
        result
    }

    /// Wait for the executing caller to commit and return its result.
    pub async fn wait(mut rx: watch::Receiver<Option<TaskResult>>) -> TaskResult {
        let recorded = rx.wait_for(|v| v.is_some()).await;
        match recorded {
            Ok(value) => (*value).clone().unwrap_or(Err(TaskError::Cancelled)),
            // The executor dropped its token without committing; treat the
            // task as torn down.
            Err(_) => Err(TaskError::Cancelled),
        }
    }

    /// Recorded result for a task, if it reached the done state.
    pub fn completed(&self, id: TaskId) -> Option<TaskResult> {
        let entries = match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(&id) {
            Some(Entry::Done(result)) => Some(result.clone()),
            _ => None,
        }
    }
}
