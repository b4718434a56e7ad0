//! Path scopes: iterating a child over a resolved path list

use std::sync::Arc;

use tracing::debug;

use crate::error::{TaskError, TaskResult};
use crate::exec::{ExecState, SkipRule};
use crate::paths::PathResolver;

use super::runnable::Runnable;

type DetectFn = Arc<dyn Fn(&PathResolver) -> Vec<String> + Send + Sync>;

/// How a scope's path list is produced.
#[derive(Clone)]
pub enum PathSpec {
    /// An explicit list of root-relative paths.
    List(Vec<String>),
    /// A detection predicate evaluated against the project root. Safe in
    /// collect phase: detection only reads the filesystem.
    Detect(DetectFn),
    /// The enclosing scope's list (or the current directory at top level).
    Inherit,
}

impl PathSpec {
    pub fn list<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PathSpec::List(paths.into_iter().map(Into::into).collect())
    }

    /// Directories containing one of the named marker files.
    pub fn detect_by_file(names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        PathSpec::Detect(Arc::new(move |resolver| {
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            resolver.detect_by_file(&refs)
        }))
    }

    /// Directories containing files with one of the given suffixes.
    pub fn detect_by_extension(exts: &[&str]) -> Self {
        let exts: Vec<String> = exts.iter().map(|s| s.to_string()).collect();
        PathSpec::Detect(Arc::new(move |resolver| {
            let refs: Vec<&str> = exts.iter().map(String::as_str).collect();
            resolver.detect_by_extension(&refs)
        }))
    }

    /// Resolve to a concrete path list. `fallback` is the inherited list.
    pub(crate) fn resolve(
        &self,
        resolver: &PathResolver,
        fallback: Option<&[String]>,
    ) -> Vec<String> {
        match self {
            PathSpec::List(paths) => paths.clone(),
            PathSpec::Detect(f) => (**f)(resolver),
            PathSpec::Inherit => fallback.map(<[String]>::to_vec).unwrap_or_default(),
        }
    }
}

/// A subtree that reassigns the working directory and iterates its child
/// over a resolved path list, augmenting the skip rules in force.
#[derive(Clone)]
pub struct PathScope {
    pub(crate) child: Runnable,
    pub(crate) spec: PathSpec,
    pub(crate) skip: Vec<SkipRule>,
}

impl PathScope {
    pub fn new(child: Runnable, spec: PathSpec) -> Self {
        PathScope {
            child,
            spec,
            skip: Vec::new(),
        }
    }

    /// Add a skip rule scoped to this subtree.
    pub fn skip(mut self, rule: SkipRule) -> Self {
        self.skip.push(rule);
        self
    }

    /// Iterate the child serially over the resolved paths. A failure stops
    /// the iteration (wrap the child in `parallel` for the opt-in
    /// parallel-over-paths shape); cancellation is checked between paths.
    pub(crate) async fn run(&self, state: &ExecState) -> TaskResult {
        let resolver = PathResolver::with_root(state.root());
        let paths = self.spec.resolve(&resolver, state.scope_paths());
        debug!(paths = paths.len(), "entering path scope");

        let scoped = state
            .clone()
            .with_skip_rules(&self.skip)
            .with_scope_paths(Arc::new(paths.clone()));

        for path in &paths {
            if scoped.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            let branch = scoped.clone().with_cwd(path.clone());
            self.child.run(&branch).await?;
        }
        Ok(())
    }
}

/// A path-scoped subtree as a runnable node.
pub fn scope(child: Runnable, spec: PathSpec) -> PathScope {
    PathScope::new(child, spec)
}
