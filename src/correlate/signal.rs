// src/correlate/signal.rs

//! One-shot listeners over broadcast streams.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::warn;

use super::CorrelationError;

/// Settles at most once with the first matching event, or an error.
///
/// The subscription behind a signal is released when it matches, when the
/// stream closes, when [`Signal::cancel`] is called, or when the signal is
/// dropped. An abandoned signal never leaves a receiver on the stream.
#[derive(Debug)]
pub struct Signal<T> {
    outcome: Option<oneshot::Receiver<Result<T, CorrelationError>>>,
    failed: Option<CorrelationError>,
    listener: Option<AbortHandle>,
}

impl<T> Signal<T> {
    /// A signal that fails immediately and holds no subscription.
    pub fn failed(err: CorrelationError) -> Self {
        Self {
            outcome: None,
            failed: Some(err),
            listener: None,
        }
    }

    /// Stop listening. A pending await resolves to
    /// [`CorrelationError::Abandoned`].
    pub fn cancel(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    /// True once the listener no longer holds a subscription.
    pub fn is_detached(&self) -> bool {
        self.listener.as_ref().is_none_or(|l| l.is_finished())
    }
}

impl<T> Drop for Signal<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> Future for Signal<T> {
    type Output = Result<T, CorrelationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(err) = this.failed.take() {
            return Poll::Ready(Err(err));
        }

        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(Err(CorrelationError::Abandoned));
        };

        match Pin::new(outcome).poll(cx) {
            Poll::Ready(result) => {
                this.outcome = None;
                this.listener = None;
                Poll::Ready(result.unwrap_or(Err(CorrelationError::Abandoned)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Listen on `rx` until an event satisfies `predicate`.
///
/// The listener drains `rx` eagerly on its own task, so a slow consumer
/// does not make the subscription lag. It drops `rx` before the signal
/// settles.
pub fn first_matching<E, F>(mut rx: broadcast::Receiver<E>, predicate: F) -> Signal<E>
where
    E: Clone + Send + 'static,
    F: Fn(&E) -> bool + Send + 'static,
{
    let (tx, outcome) = oneshot::channel();

    let listener = tokio::spawn(async move {
        let result = loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => break Ok(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged; events were dropped");
                    continue;
                }
                Err(RecvError::Closed) => break Err(CorrelationError::StreamClosed),
            }
        };
        drop(rx);
        let _ = tx.send(result);
    });

    Signal {
        outcome: Some(outcome),
        failed: None,
        listener: Some(listener.abort_handle()),
    }
}
