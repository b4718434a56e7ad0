//! Two-phase enumeration of the runnable tree
//!
//! The walker visits every node without executing actions, commands or do
//! bodies. Detection predicates are evaluated (they only read the
//! filesystem), so the reported paths match what an execute traversal
//! would visit. Help, name validation and the CI export all consume this.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::exec::TaskId;
use crate::paths::PathResolver;
use crate::runner::{Runnable, Task};

/// Exported description of one task, suitable for CI matrix generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub usage: String,
    /// Directories the task runs in, from the enclosing path scopes.
    /// `["."]` for root-only tasks.
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One task occurrence found by the walker.
pub struct CollectedTask {
    pub task: Arc<Task>,
    pub info: TaskInfo,
    /// Whether this occurrence would have been deduplicated: the same
    /// definition already appeared earlier along the reachable tree.
    pub deduped: bool,
    /// Resolved path list of the innermost enclosing scope, when any.
    /// The CLI rebinds these when the task is named on argv, so `pok lint`
    /// covers the same directories the pipeline would.
    pub scope_paths: Option<Vec<String>>,
}

/// Enumerate the tree in declaration order without running anything.
pub fn collect(root: &Runnable, resolver: &PathResolver) -> Vec<CollectedTask> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    walk(root, resolver, None, &mut seen, &mut out);
    out
}

fn walk(
    node: &Runnable,
    resolver: &PathResolver,
    scope_paths: Option<&Vec<String>>,
    seen: &mut HashSet<TaskId>,
    out: &mut Vec<CollectedTask>,
) {
    match node {
        Runnable::Task(task) => {
            let paths = match scope_paths {
                Some(paths) => paths.clone(),
                None => vec![".".to_string()],
            };
            let deduped = !seen.insert(task.id());
            out.push(CollectedTask {
                task: Arc::clone(task),
                info: TaskInfo {
                    name: task.name().to_string(),
                    usage: task.usage().to_string(),
                    paths,
                    hidden: task.is_hidden(),
                },
                deduped,
                scope_paths: scope_paths.cloned(),
            });
            // Composed bodies stay visible: nested tasks (tool installers)
            // are enumerated under the same scope. Closure actions are
            // opaque.
            if let Some(body) = task.body() {
                walk(body, resolver, scope_paths, seen, out);
            }
        }
        Runnable::Serial(children) | Runnable::Parallel(children) => {
            for child in children {
                walk(child, resolver, scope_paths, seen, out);
            }
        }
        Runnable::Scope(scope) => {
            let paths = scope.spec.resolve(resolver, scope_paths.map(Vec::as_slice));
            walk(&scope.child, resolver, Some(&paths), seen, out);
        }
        // Leaves without names are not enumerated, and never executed
        // here.
        Runnable::Command(_) | Runnable::Do(_) => {}
    }
}

/// Distinct tasks by name, declaration order preserved. Fails on empty or
/// duplicate names (two different definitions sharing one name).
pub fn task_index(collected: &[CollectedTask]) -> Result<Vec<Arc<Task>>> {
    let mut by_name: HashMap<&str, TaskId> = HashMap::new();
    let mut index = Vec::new();
    for entry in collected {
        let name = entry.task.name();
        if name.is_empty() {
            return Err(ConfigError::EmptyTaskName.into());
        }
        match by_name.get(name) {
            Some(id) if *id == entry.task.id() => {}
            Some(_) => return Err(ConfigError::DuplicateName(name.to_string()).into()),
            None => {
                by_name.insert(name, entry.task.id());
                index.push(Arc::clone(&entry.task));
            }
        }
    }
    Ok(index)
}

/// Export every task (hidden included; consumers filter) as a
/// pretty-printed JSON document with two-space indentation.
pub fn export_json(root: &Runnable, resolver: &PathResolver) -> Result<String> {
    let collected = collect(root, resolver);
    let infos: Vec<&TaskInfo> = collected
        .iter()
        .filter(|c| !c.deduped)
        .map(|c| &c.info)
        .collect();
    Ok(serde_json::to_string_pretty(&infos)?)
}
