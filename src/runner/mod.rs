//! The runnable tree and its execution
//!
//! Tasks, serial/parallel composition, path scopes and command/do leaves
//! all implement the same two operations: run under an [`ExecState`], and
//! be enumerated by the collect walker without side effects.

pub mod command;
pub mod compose;
pub mod runnable;
pub mod scope;
pub mod task;

pub use command::*;
pub use runnable::*;
pub use scope::*;
pub use task::*;
