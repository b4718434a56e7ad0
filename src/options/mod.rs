//! Per-task options: schemas, inspection and CLI flag binding
//!
//! A task declares the flags it accepts as a [`Schema`]. The binder turns a
//! raw argv slice into typed [`Values`] before the task's action runs.

pub mod parse;
pub mod schema;

pub use parse::*;
pub use schema::*;
