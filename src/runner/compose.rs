//! Serial and parallel composition

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use crate::error::{is_cancelled, TaskError, TaskResult};
use crate::exec::{ExecState, OutputSink};

use super::runnable::Runnable;

/// Run children in declared order. The first failure is returned
/// immediately and the remaining children are not started. Cancellation
/// observed between children returns the cancellation sentinel.
pub(crate) async fn run_serial(children: &[Runnable], state: &ExecState) -> TaskResult {
    for child in children {
        if state.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        child.run(state).await?;
    }
    Ok(())
}

/// Run children concurrently. Each child writes into its own buffer,
/// flushed to the parent sink in completion order so output never
/// interleaves mid-line. The first failure requests cancellation for the
/// siblings; the combinator still waits for every child to terminate and
/// prefers real failures over the cancellation sentinel.
pub(crate) async fn run_parallel(children: &[Runnable], state: &ExecState) -> TaskResult {
    if children.is_empty() {
        return Ok(());
    }

    let mut branches = FuturesUnordered::new();
    for child in children {
        let sink = OutputSink::buffer();
        let branch = state.clone().with_out(sink.clone());
        branches.push(async move {
            let result = child.run(&branch).await;
            (sink, result)
        });
    }

    let mut first_err: Option<TaskError> = None;
    while let Some((sink, result)) = branches.next().await {
        let buffered = sink.drain();
        if !buffered.is_empty() {
            state.out().write(&buffered);
        }
        if let Err(err) = result {
            debug!(error = %err, "parallel child failed");
            state.request_cancel();
            match &first_err {
                None => first_err = Some(err),
                Some(prev) if is_cancelled(prev) && !is_cancelled(&err) => {
                    first_err = Some(err);
                }
                Some(_) => {}
            }
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Phase;
    use crate::runner::runnable::{parallel, run_fn, serial};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(hits: &Arc<AtomicUsize>) -> Runnable {
        let hits = Arc::clone(hits);
        run_fn(move |_state| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn failing(reason: &str) -> Runnable {
        let reason = reason.to_string();
        run_fn(move |_state| {
            let reason = reason.clone();
            async move { Err(TaskError::ActionFailed(reason)) }
        })
    }

    #[tokio::test]
    async fn empty_serial_is_ok() {
        let state = ExecState::new("/proj", Phase::Execute);
        assert_eq!(serial(Vec::new()).run(&state).await, Ok(()));
    }

    #[tokio::test]
    async fn empty_parallel_is_ok() {
        let state = ExecState::new("/proj", Phase::Execute);
        assert_eq!(parallel(Vec::new()).run(&state).await, Ok(()));
    }

    #[tokio::test]
    async fn serial_short_circuits_on_failure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = ExecState::new("/proj", Phase::Execute);

        let tree = serial(vec![counting(&hits), failing("boom"), counting(&hits)]);
        let err = tree.run(&state).await.unwrap_err();

        assert_eq!(err, TaskError::ActionFailed("boom".to_string()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn serial_observes_cancellation_between_children() {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = ExecState::new("/proj", Phase::Execute);

        let cancel = run_fn({
            let state = state.clone();
            move |_| {
                let state = state.clone();
                async move {
                    state.request_cancel();
                    Ok(())
                }
            }
        });
        let tree = serial(vec![cancel, counting(&hits)]);
        let err = tree.run(&state).await.unwrap_err();

        assert_eq!(err, TaskError::Cancelled);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn parallel_failure_cancels_siblings_but_waits_for_them() {
        let state = ExecState::new("/proj", Phase::Execute);
        let finished = Arc::new(AtomicUsize::new(0));

        let slow = run_fn({
            let finished = Arc::clone(&finished);
            let state = state.clone();
            move |_| {
                let finished = Arc::clone(&finished);
                let state = state.clone();
                async move {
                    state.cancel().cancelled().await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Err(TaskError::Cancelled)
                }
            }
        });
        let tree = parallel(vec![slow, failing("fast failure")]);
        let err = tree.run(&state).await.unwrap_err();

        // The sibling terminated before the combinator returned, and the
        // real failure wins over the cancellation sentinel.
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(err, TaskError::ActionFailed("fast failure".to_string()));
    }

    #[tokio::test]
    async fn parallel_output_is_flushed_per_child() {
        let sink = OutputSink::buffer();
        let state = ExecState::new("/proj", Phase::Execute)
            .with_out(sink.clone());

        let noisy = |tag: &str| {
            let tag = tag.to_string();
            run_fn(move |branch: ExecState| {
                let tag = tag.clone();
                async move {
                    branch.out().line(&format!("{tag} one"));
                    branch.out().line(&format!("{tag} two"));
                    Ok(())
                }
            })
        };
        parallel(vec![noisy("a"), noisy("b")]).run(&state).await.unwrap();

        let text = sink.contents();
        // Each child's two lines stay adjacent regardless of completion
        // order.
        let a = text.find("a one").unwrap();
        let b = text.find("b one").unwrap();
        assert_eq!(text.match_indices("one").count(), 2);
        assert!(text[a..].starts_with("a one\na two\n") || text[b..].starts_with("b one\nb two\n"));
    }
}
