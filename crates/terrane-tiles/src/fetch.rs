//! Abortable tile fetches.
//!
//! An [`AbortableFetch`] is the consumer half of a single tile request. It can
//! be awaited like any future, polled without blocking from a synchronous
//! frame loop via [`try_take`](AbortableFetch::try_take), and cancelled with
//! [`abort`](AbortableFetch::abort). The producer half is a
//! [`FetchResponder`], usually moved into a task on a tokio runtime.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::AbortHandle;

use crate::FetchError;

/// Outcome of one tile fetch.
pub type FetchResult = Result<Vec<u8>, FetchError>;

/// Consumer side of an in-flight tile request.
#[derive(Debug)]
pub struct AbortableFetch {
    receiver: oneshot::Receiver<FetchResult>,
    task: Option<AbortHandle>,
    aborted: bool,
}

/// Producer side of an in-flight tile request.
#[derive(Debug)]
pub struct FetchResponder {
    sender: oneshot::Sender<FetchResult>,
}

impl FetchResponder {
    /// Deliver the result. Silently dropped if the fetch was aborted.
    pub fn respond(self, result: FetchResult) {
        let _ = self.sender.send(result);
    }

    /// Returns `true` once the consumer aborted or dropped the fetch.
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }
}

impl AbortableFetch {
    /// A fetch completed by whoever holds the returned responder.
    pub fn pending() -> (FetchResponder, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            FetchResponder { sender },
            Self {
                receiver,
                task: None,
                aborted: false,
            },
        )
    }

    /// A fetch that is already complete.
    pub fn ready(result: FetchResult) -> Self {
        let (responder, fetch) = Self::pending();
        responder.respond(result);
        fetch
    }

    /// Run `future` on `runtime`; aborting the fetch aborts the task.
    pub fn spawn<F>(runtime: &Handle, future: F) -> Self
    where
        F: Future<Output = FetchResult> + Send + 'static,
    {
        let (responder, mut fetch) = Self::pending();
        let task = runtime.spawn(async move {
            responder.respond(future.await);
        });
        fetch.task = Some(task.abort_handle());
        fetch
    }

    /// Cancel the request. Idempotent; no result is observed afterwards.
    pub fn abort(&mut self) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Take the result if it has arrived. Never blocks.
    ///
    /// Returns `None` while the request is in flight and always after
    /// [`abort`](Self::abort).
    pub fn try_take(&mut self) -> Option<FetchResult> {
        if self.aborted {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(FetchError::Cancelled)),
        }
    }
}

impl Future for AbortableFetch {
    type Output = FetchResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.aborted {
            return Poll::Ready(Err(FetchError::Aborted));
        }
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(FetchError::Cancelled)))
    }
}

impl Drop for AbortableFetch {
    fn drop(&mut self) {
        // Dropping an unfinished fetch releases its network task too.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
