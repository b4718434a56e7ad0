//! Error types for the pocket engine

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pocket operations
pub type Result<T> = std::result::Result<T, PocketError>;

/// Result of running a task or any other node of the runnable tree.
///
/// Failures are recorded in the dedup registry and handed out to every
/// observer of the task, which is why [`TaskError`] is `Clone`.
pub type TaskResult = std::result::Result<(), TaskError>;

/// Main error type for pocket
#[derive(Error, Debug)]
pub enum PocketError {
    /// Configuration-related errors (task tree validation, CLI selection)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Project root and path resolution errors
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// Options schema and flag parsing errors
    #[error("option error: {0}")]
    Options(#[from] OptionsError),

    /// A task (or the pipeline it drives) failed
    #[error("task {name} failed: {source}")]
    Task {
        name: String,
        #[source]
        source: TaskError,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors (task export)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Task tree and CLI selection errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("task name must not be empty")]
    EmptyTaskName,

    #[error("duplicate task name: {0}")]
    DuplicateName(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("unexpected flag before any task name: {0}")]
    FlagBeforeTask(String),
}

/// Project root resolution errors
#[derive(Error, Debug)]
pub enum PathError {
    #[error("no project root found (no .git above {0})")]
    NoProjectRoot(PathBuf),

    #[error("failed to read current directory: {0}")]
    CurrentDir(io::Error),
}

/// Options schema and flag parsing errors.
///
/// These surface before a task's action runs and become that task's
/// recorded result, so the type is `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("invalid options schema for field '{field}': {reason}")]
    SchemaInvalid { field: String, reason: String },

    #[error("unknown flag: -{flag}")]
    FlagUnknown { flag: String },

    #[error("bad value for flag -{flag}: {reason}")]
    FlagValueBad { flag: String, reason: String },
}

/// Failures produced while executing the runnable tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("command `{program}` exited with {}{}", code_display(*code), tail_display(tail))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        tail: String,
    },

    #[error("failed to start `{program}`: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("{0}")]
    ActionFailed(String),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error("cancelled")]
    Cancelled,
}

impl TaskError {
    /// Shorthand for an action failure with a formatted reason.
    pub fn action(reason: impl Into<String>) -> Self {
        TaskError::ActionFailed(reason.into())
    }
}

/// Helper to decide whether an error is the cancellation sentinel rather
/// than a real failure. Parallel composition prefers real failures.
pub fn is_cancelled(err: &TaskError) -> bool {
    matches!(err, TaskError::Cancelled)
}

fn code_display(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "signal".to_string(),
    }
}

fn tail_display(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {}", tail.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_formats_exit_code_and_tail() {
        let err = TaskError::CommandFailed {
            program: "lint".to_string(),
            code: Some(2),
            tail: "boom\n".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`lint`"), "got: {msg}");
        assert!(msg.contains("code 2"), "got: {msg}");
        assert!(msg.contains("boom"), "got: {msg}");
    }

    #[test]
    fn command_failed_without_code_reports_signal() {
        let err = TaskError::CommandFailed {
            program: "x".to_string(),
            code: None,
            tail: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn cancelled_is_detected() {
        assert!(is_cancelled(&TaskError::Cancelled));
        assert!(!is_cancelled(&TaskError::ActionFailed("x".into())));
    }

    #[test]
    fn options_error_converts_into_task_error() {
        let err: TaskError = OptionsError::FlagUnknown { flag: "env".into() }.into();
        assert_eq!(
            err,
            TaskError::Options(OptionsError::FlagUnknown { flag: "env".into() })
        );
    }
}
