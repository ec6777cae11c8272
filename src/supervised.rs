//! # Supervised long-running tasks.
//!
//! Uniform shape for every long-lived task in the crate (per-container
//! step process, health supervisor, reconciler): the task receives a
//! [`CancellationToken`] and a one-shot [`ReadySignal`], and its handle
//! exposes cancel / ready / wait.
//!
//! A fresh one-shot channel backs each ready signal, observed by at most
//! one reader; this avoids the leaky-subscription problems of broadcast
//! primitives.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One-shot "prepared to accept work" signal handed to the task body.
pub struct ReadySignal {
    tx: oneshot::Sender<()>,
}

impl ReadySignal {
    /// Fires the signal. Consumes the signal; a second notification is
    /// impossible by construction.
    pub fn notify(self) {
        let _ = self.tx.send(());
    }
}

/// Handle to a supervised task.
pub struct Supervised<E> {
    token: CancellationToken,
    ready: Option<oneshot::Receiver<()>>,
    handle: JoinHandle<Result<(), E>>,
}

/// Spawns `run` as a supervised task.
///
/// The task must exit promptly once the token is cancelled; cancellation
/// is a request, not a kill.
pub fn spawn<E, F, Fut>(run: F) -> Supervised<E>
where
    F: FnOnce(CancellationToken, ReadySignal) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let token = CancellationToken::new();
    let (ready_tx, ready_rx) = oneshot::channel();
    let future = run(token.clone(), ReadySignal { tx: ready_tx });
    Supervised {
        token,
        ready: Some(ready_rx),
        handle: tokio::spawn(future),
    }
}

impl<E> Supervised<E> {
    /// Requests cooperative termination. Non-blocking, idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits until the task signals readiness. Returns `false` if the
    /// task exited without ever signalling, or on a second call.
    pub async fn ready(&mut self) -> bool {
        match self.ready.take() {
            Some(rx) => rx.await.is_ok(),
            None => false,
        }
    }

    /// Waits for the task to exit and returns its terminal result.
    /// A panicking task resumes the panic on the waiter.
    pub async fn wait(self) -> Result<(), E> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            // Never aborted by this crate; treat as a clean exit.
            Err(_) => Ok(()),
        }
    }
}
