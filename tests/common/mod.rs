//! Common test utilities

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pocket::{ExecState, OutputSink, Phase, Task};
use tempfile::TempDir;

/// Create a temporary project tree with a `.git` marker and the given
/// module directories.
pub fn create_project(dirs: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join(".git")).unwrap();
    for dir in dirs {
        fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }
    tmp
}

/// Execution state rooted in the project, writing into a buffer sink.
pub fn buffered_state(project: &TempDir) -> (ExecState, OutputSink) {
    let sink = OutputSink::buffer();
    let state = ExecState::new(project.path(), Phase::Execute).with_out(sink.clone());
    (state, sink)
}

/// A task whose action bumps the counter once per invocation.
pub fn counting_task(name: &str, hits: &Arc<AtomicUsize>) -> Arc<Task> {
    let hits = Arc::clone(hits);
    Task::new(name, format!("count {name}"), move |_ctx| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}
