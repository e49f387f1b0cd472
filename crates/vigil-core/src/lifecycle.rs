//! Start/kill/wait discipline for long-lived pipeline tasks.
//!
//! Every component in the pipeline (reader, queue dispatcher, differ,
//! watcher) runs one or more tokio tasks under a [`Lifecycle`]:
//!
//! - [`Lifecycle::spawn`] starts a task; child tasks spawned on the same
//!   lifecycle inherit its kill signal and are subsumed by `wait`.
//! - [`Lifecycle::kill`] signals termination without blocking.
//! - [`Lifecycle::wait`] completes once every task has returned, yielding the
//!   first terminating error, if any.
//! - [`Lifecycle::close`] is `kill` followed by `wait`.
//!
//! A task observing the kill signal returns `Ok(())`: shutdown is normal
//! termination, not an error. Closing a component's output channel happens in
//! the terminating task (by dropping the sender), so it closes exactly once.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Lifecycle<E> {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<Result<(), E>>>>,
    err: Mutex<Option<Arc<E>>>,
}

impl<E> Lifecycle<E>
where
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            err: Mutex::new(None),
        }
    }

    /// The kill signal tasks must compose into every blocking wait.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A child signal for a subordinate lifecycle; cancelled when this one is.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Run a task under this lifecycle. Its return value is gathered by
    /// [`wait`](Self::wait).
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.tasks.lock().push(handle);
    }

    /// Signal termination. Non-blocking and idempotent.
    pub fn kill(&self) {
        self.token.cancel();
    }

    /// Wait for every spawned task to return. Yields the first terminating
    /// error; subsequent callers observe the same error via the shared
    /// reference.
    ///
    /// A task that panicked has its panic propagated here: a panic is a
    /// programmer error, not a lifecycle outcome.
    pub async fn wait(&self) -> Result<(), Arc<E>> {
        let handles: Vec<_> = { self.tasks.lock().drain(..).collect() };
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let mut slot = self.err.lock();
                    if slot.is_none() {
                        *slot = Some(Arc::new(e));
                    }
                }
                Err(join_err) => {
                    if join_err.is_panic() {
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                }
            }
        }
        match self.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `kill` then `wait`.
    pub async fn close(&self) -> Result<(), Arc<E>> {
        self.kill();
        self.wait().await
    }

    /// The error that terminated this lifecycle, once `wait` has gathered it.
    pub fn err(&self) -> Option<Arc<E>> {
        self.err.lock().clone()
    }
}

impl<E> Default for Lifecycle<E>
where
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
