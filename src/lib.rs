//! Pocket - a self-bootstrapping task runner engine
//!
//! Pocket turns a user-declared tree of tasks into a single correct
//! execution: every task runs at most once per invocation, serial and
//! parallel composition behave as declared, path scopes iterate work over
//! detected project directories, and cancellation propagates through the
//! whole subprocess tree.
//!
//! A project declares its pipeline in its `.pocket` configuration crate
//! and hands it to the CLI:
//!
//! ```no_run
//! use pocket::{cli, command, parallel, serial, Runnable, Task};
//!
//! let install = Task::new("install:linter", "install the linter", |ctx| async move {
//!     ctx.out().line("installing…");
//!     Ok(())
//! })
//! .as_hidden();
//!
//! let lint = Task::from_runnable(
//!     "lint",
//!     "run the linter",
//!     serial(vec![install.clone().into(), command("golangci-lint", ["run"])]),
//! );
//! let test = Task::from_runnable(
//!     "test",
//!     "run tests",
//!     serial(vec![install.into(), command("go", ["test", "./..."])]),
//! );
//!
//! let pipeline = parallel(vec![Runnable::from(lint), Runnable::from(test)]);
//! std::process::exit(cli::run(cli::Config::new(pipeline)));
//! ```

// Public modules
pub mod cli;
pub mod collect;
pub mod error;
pub mod exec;
pub mod options;
pub mod paths;
pub mod runner;

// Re-export commonly used types
pub use collect::{collect, export_json, CollectedTask, TaskInfo};
pub use error::{ConfigError, OptionsError, PathError, PocketError, Result, TaskError, TaskResult};
pub use exec::{DedupRegistry, ExecState, OutputSink, Phase, SkipRule, TaskId};
pub use options::{Field, FieldKind, OptionValue, Schema, Values};
pub use paths::PathResolver;
pub use runner::{
    command, command_with, parallel, run_fn, scope, serial, PathScope, PathSpec, Runnable, Task,
    TaskContext,
};

/// Current version of pocket
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
