//! Handles to running queries
//!
//! Every spawned execution returns a [`QueryHandle`]. There is no global
//! table of outstanding queries: a caller that wants "cancel everything"
//! semantics either keeps its handles or hands out child tokens from a
//! [`QueryGroup`].

use querykit_core::AsyncResult;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running query.
///
/// Observers [`subscribe`](Self::subscribe) to see the state move from
/// `NotStarted` to `InProgress` to a terminal state. A cancelled query never
/// publishes a terminal state and [`wait`](Self::wait) returns `None`.
///
/// Dropping the handle detaches the query; it keeps running until it
/// finishes or its token is cancelled.
#[derive(Debug)]
pub struct QueryHandle<E, A> {
    cancel: CancellationToken,
    state: watch::Receiver<AsyncResult<E, A>>,
    task: JoinHandle<Option<AsyncResult<E, A>>>,
}

impl<E, A> QueryHandle<E, A>
where
    E: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// Run `run` on a tokio task, publishing its lifecycle.
    ///
    /// `run` receives the cancellation token and must return `None` when it
    /// was cancelled, or `Some(terminal)` otherwise.
    pub fn spawn<F, Fut>(cancel: CancellationToken, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Option<AsyncResult<E, A>>> + Send + 'static,
    {
        let (tx, state) = watch::channel(AsyncResult::NotStarted);
        let work = run(cancel.clone());

        let task = tokio::spawn(async move {
            tx.send_replace(AsyncResult::InProgress);
            let outcome = work.await;
            if let Some(terminal) = &outcome {
                tx.send_replace(terminal.clone());
            }
            outcome
        });

        Self {
            cancel,
            state,
            task,
        }
    }
}

impl<E, A> QueryHandle<E, A> {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The token this query observes.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the task has stopped, by finishing or by cancellation.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// A receiver that sees every published state.
    pub fn subscribe(&self) -> watch::Receiver<AsyncResult<E, A>> {
        self.state.clone()
    }

    /// The latest published state.
    pub fn current(&self) -> AsyncResult<E, A>
    where
        E: Clone,
        A: Clone,
    {
        self.state.borrow().clone()
    }

    /// Wait for the query to stop.
    ///
    /// Returns the terminal state, or `None` if the query was cancelled.
    /// A panic inside the query is propagated.
    pub async fn wait(self) -> Option<AsyncResult<E, A>> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => None,
        }
    }
}

/// A set of queries that can be cancelled together.
///
/// ```rust
/// use querykit::QueryGroup;
///
/// let group = QueryGroup::new();
/// let a = group.child_token();
/// let b = group.child_token();
///
/// group.cancel_all();
/// assert!(a.is_cancelled() && b.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryGroup {
    token: CancellationToken,
}

impl QueryGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled when the group is; cancelling it alone leaves the
    /// rest of the group running.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Cancel every query created from this group, now and in the future.
    pub fn cancel_all(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel_all`](Self::cancel_all) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handle_publishes_lifecycle() {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let handle: QueryHandle<String, u32> =
            QueryHandle::spawn(CancellationToken::new(), |_| async move {
                let _ = release_rx.await;
                Some(AsyncResult::Success(7))
            });

        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.is_in_progress()).await.unwrap();

        release_tx.send(()).unwrap();
        let terminal = rx.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert_eq!(terminal, AsyncResult::Success(7));
        assert_eq!(handle.current(), AsyncResult::Success(7));
        assert_eq!(handle.wait().await, Some(AsyncResult::Success(7)));
    }

    #[tokio::test]
    async fn test_cancelled_handle_has_no_terminal_state() {
        let handle: QueryHandle<String, u32> =
            QueryHandle::spawn(CancellationToken::new(), |cancel| async move {
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    _ = tokio::time::sleep(Duration::from_secs(60)) => Some(AsyncResult::Success(1)),
                }
            });

        let rx = handle.subscribe();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.wait().await, None);
        assert!(!rx.borrow().is_terminal());
    }

    #[test]
    fn test_group_children_cancel_independently() {
        let group = QueryGroup::new();
        let a = group.child_token();
        let b = group.child_token();

        a.cancel();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!group.is_cancelled());

        group.cancel_all();
        assert!(b.is_cancelled());
        assert!(group.child_token().is_cancelled());
    }
}
