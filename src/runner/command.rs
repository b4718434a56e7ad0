//! External command execution

use std::env;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{TaskError, TaskResult};
use crate::exec::{ExecState, OutputSink, Phase, RingBuffer};
use crate::paths::{color_env, prepend_path, PathResolver};

use super::runnable::Runnable;

/// How long a cancelled subprocess gets to exit after the terminate
/// signal before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// How much subprocess stderr is retained for failure reports.
const STDERR_TAIL_BYTES: usize = 4096;

type ArgsFn = Arc<dyn Fn(&ExecState) -> Vec<String> + Send + Sync>;

#[derive(Clone)]
enum ArgSource {
    Static(Vec<String>),
    /// Evaluated at execute time, so parsed options can shape argv
    /// without changing the tree. Never invoked in collect phase.
    Thunk(ArgsFn),
}

/// An external command as a leaf of the runnable tree.
///
/// The subprocess runs in `<root>/<cwd>` with `<root>/.pocket/bin`
/// prepended to `PATH`; stdout and stderr are piped into the execution's
/// output sink.
#[derive(Clone)]
pub struct Command {
    program: String,
    args: ArgSource,
}

/// A command with a static argument slice.
pub fn command<I, S>(program: impl Into<String>, args: I) -> Runnable
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runnable::Command(Command {
        program: program.into(),
        args: ArgSource::Static(args.into_iter().map(Into::into).collect()),
    })
}

/// A command whose arguments are computed at execute time from the
/// execution state (current options, verbosity, working directory).
pub fn command_with<F>(program: impl Into<String>, args: F) -> Runnable
where
    F: Fn(&ExecState) -> Vec<String> + Send + Sync + 'static,
{
    Runnable::Command(Command {
        program: program.into(),
        args: ArgSource::Thunk(Arc::new(args)),
    })
}

impl Command {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub(crate) async fn run(&self, state: &ExecState) -> TaskResult {
        if state.phase() == Phase::Collect {
            return Ok(());
        }

        let args = match &self.args {
            ArgSource::Static(args) => args.clone(),
            ArgSource::Thunk(f) => (**f)(state),
        };
        let resolver = PathResolver::with_root(state.root());
        let dir = if state.cwd() == "." {
            resolver.root().to_path_buf()
        } else {
            resolver.from_root(state.cwd())
        };

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&args)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.env(
            "PATH",
            prepend_path(env::var_os("PATH").as_deref(), &resolver.bin_dir()),
        );
        for (key, value) in color_env(
            state.out().is_terminal(),
            env::var_os("NO_COLOR").is_some(),
        ) {
            cmd.env(key, value);
        }

        debug!(program = %self.program, ?args, dir = %dir.display(), "spawning command");
        let mut child = cmd.spawn().map_err(|e| TaskError::SpawnFailed {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;

        let ring = RingBuffer::new(STDERR_TAIL_BYTES);
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump(stdout, state.out().clone(), None));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump(stderr, state.out().clone(), Some(Arc::clone(&ring))));
        }

        let status = tokio::select! {
            status = child.wait() => status,
            _ = state.cancel().cancelled() => {
                debug!(program = %self.program, "cancelled, terminating");
                shutdown(&mut child).await;
                drain(pumps).await;
                return Err(TaskError::Cancelled);
            }
        };
        drain(pumps).await;

        let status = status.map_err(|e| TaskError::SpawnFailed {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(TaskError::CommandFailed {
                program: self.program.clone(),
                code: status.code(),
                tail: ring.tail(),
            })
        }
    }
}

/// Terminate, wait out the grace period, then kill.
async fn shutdown(child: &mut Child) {
    terminate(child);
    if tokio::time::timeout(TERMINATE_GRACE, child.wait())
        .await
        .is_err()
    {
        let _ = child.kill().await;
    }
}

#[cfg(unix)]
fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &Child) {
    // No terminate signal on this platform; the grace timeout in
    // `shutdown` falls through to the hard kill.
    let _ = child;
}

fn pump<R>(mut reader: R, sink: OutputSink, ring: Option<Arc<RingBuffer>>) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8 * 1024];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    sink.write(&buf[..n]);
                    if let Some(ring) = &ring {
                        ring.push(&buf[..n]);
                    }
                }
            }
        }
    })
}

async fn drain(pumps: Vec<JoinHandle<()>>) {
    for pump in pumps {
        let _ = pump.await;
    }
}
