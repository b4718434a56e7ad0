//! Integration tests for the CLI surface: selection, flags, export and
//! exit codes.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{counting_task, create_project};
use pocket::cli::{export, run_with_args, Config};
use pocket::{command, parallel, serial, Field, Runnable, Schema, Task, TaskInfo};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn no_arguments_runs_the_default_pipeline() {
    let project = create_project(&[]);
    let hits = Arc::new(AtomicUsize::new(0));
    let fmt = counting_task("fmt", &hits);

    let config = Config::new(Runnable::from(fmt)).with_root(project.path());
    let code = run_with_args(config, Vec::new());

    assert_eq!(code, 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn named_tasks_run_in_argv_order() {
    let project = create_project(&[]);
    let order = Arc::new(Mutex::new(Vec::new()));
    let task = |name: &str| {
        let order = Arc::clone(&order);
        let task_name = name.to_string();
        Task::new(name, "ordered", move |_ctx| {
            let order = Arc::clone(&order);
            let task_name = task_name.clone();
            async move {
                order.lock().unwrap().push(task_name);
                Ok(())
            }
        })
    };

    let config = Config::new(parallel(vec![
        Runnable::from(task("lint")),
        Runnable::from(task("fmt")),
    ]))
    .with_root(project.path());
    let code = run_with_args(config, strings(&["fmt", "lint"]));

    assert_eq!(code, 0);
    assert_eq!(*order.lock().unwrap(), strings(&["fmt", "lint"]));
}

#[test]
fn unknown_task_name_runs_nothing() {
    let project = create_project(&[]);
    let lint_hits = Arc::new(AtomicUsize::new(0));
    let fmt_hits = Arc::new(AtomicUsize::new(0));

    let config = Config::new(serial(vec![
        Runnable::from(counting_task("lint", &lint_hits)),
        Runnable::from(counting_task("fmt", &fmt_hits)),
    ]))
    .with_root(project.path());
    let code = run_with_args(config, strings(&["lint", "fmt", "nope"]));

    assert_eq!(code, 1);
    assert_eq!(lint_hits.load(Ordering::SeqCst), 0);
    assert_eq!(fmt_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn per_task_flags_reach_the_action() {
    let project = create_project(&[]);
    let seen = Arc::new(Mutex::new(String::new()));
    let greet = {
        let seen = Arc::clone(&seen);
        Task::new("greet", "greets an environment", move |ctx| {
            let seen = Arc::clone(&seen);
            async move {
                *seen.lock().unwrap() =
                    format!("{}+{}", ctx.opts().str("env"), ctx.opts().flag("loud"));
                Ok(())
            }
        })
        .with_options(Schema::new(vec![
            Field::string("env", "environment").with_default("dev"),
            Field::bool("loud", "shout"),
        ]))
    };

    let config = Config::new(Runnable::from(greet)).with_root(project.path());
    let code = run_with_args(config, strings(&["greet", "-env", "prod", "-loud"]));

    assert_eq!(code, 0);
    assert_eq!(*seen.lock().unwrap(), "prod+true");
}

#[test]
fn unknown_flag_fails_before_the_action() {
    let project = create_project(&[]);
    let hits = Arc::new(AtomicUsize::new(0));
    let config = Config::new(Runnable::from(counting_task("lint", &hits)))
        .with_root(project.path());

    let code = run_with_args(config, strings(&["lint", "-bogus"]));

    assert_eq!(code, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_task_maps_to_exit_one() {
    let project = create_project(&[]);
    let broken = Task::from_runnable("broken", "always fails", command("sh", ["-c", "exit 2"]));
    let config = Config::new(Runnable::from(broken)).with_root(project.path());

    assert_eq!(run_with_args(config, strings(&["broken"])), 1);
}

#[test]
fn help_exits_zero_without_running_tasks() {
    let project = create_project(&[]);
    let hits = Arc::new(AtomicUsize::new(0));
    let config = Config::new(Runnable::from(counting_task("fmt", &hits)))
        .with_root(project.path());

    assert_eq!(run_with_args(config, strings(&["-h"])), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn duplicate_task_names_fail_before_anything_runs() {
    let project = create_project(&[]);
    let hits = Arc::new(AtomicUsize::new(0));
    let config = Config::new(serial(vec![
        Runnable::from(counting_task("lint", &hits)),
        Runnable::from(counting_task("lint", &hits)),
    ]))
    .with_root(project.path());

    assert_eq!(run_with_args(config, Vec::new()), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn named_task_keeps_its_pipeline_path_mapping() {
    use pocket::{scope, PathSpec};

    let project = create_project(&["svc/a", "svc/b"]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let lint = {
        let seen = Arc::clone(&seen);
        Task::new("lint", "lint modules", move |ctx| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().extend(ctx.paths().to_vec());
                Ok(())
            }
        })
    };

    let pipeline: Runnable = scope(Runnable::from(lint), PathSpec::list(["svc/a", "svc/b"])).into();
    let config = Config::new(pipeline).with_root(project.path());
    let code = run_with_args(config, strings(&["lint"]));

    assert_eq!(code, 0);
    assert_eq!(*seen.lock().unwrap(), strings(&["svc/a", "svc/b"]));
}

#[test]
fn export_lists_tasks_without_spawning_commands() {
    let project = create_project(&[]);
    let hidden = counting_task("inst", &Arc::new(AtomicUsize::new(0))).as_hidden();
    let lint = Task::from_runnable(
        "lint",
        "run linter",
        serial(vec![hidden.clone().into(), command("false", Vec::<String>::new())]),
    );

    let config = Config::new(serial(vec![
        Runnable::from(hidden),
        Runnable::from(lint),
    ]))
    .with_root(project.path());

    let json = export(&config).unwrap();
    let parsed: Vec<TaskInfo> = serde_json::from_str(&json).unwrap();

    let names: Vec<&str> = parsed.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["inst", "lint"]);
    assert!(parsed[0].hidden);
    assert_eq!(parsed[1].paths, vec!["."]);
}
