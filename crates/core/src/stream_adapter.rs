// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-adapter primitives built on top of [`crate::scope`].
//!
//! Transform a one-shot channel into a disposable future ([`OnceEvent`]), and
//! a broadcast channel into a disposable, bounded async stream
//! ([`EventStream`]). Both guarantee the underlying receiver is dropped
//! (unsubscribing it) on disposal and on completion.

use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::Stream;

/// Default ring-buffer capacity for [`EventStream`] when none is specified.
pub const DEFAULT_RING_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum StreamAdapterError {
    #[error("listener disposed before the event arrived")]
    Disposed,
    #[error("sender side dropped without emitting")]
    Canceled,
    #[error("adapter configured to reject on emission: {0}")]
    Signaled(String),
}

/// A one-shot channel adapted into a disposable future.
///
/// In "resolve" mode (the default) the future resolves with the received
/// value. In "reject" mode (`rejects = true`, used for error-event
/// adapters) the received value is turned into an `Err`, so it composes with
/// a success adapter via a single `tokio::select!`/`race` without extra
/// glue — the idiom the design notes call a "single `Promise.race`".
pub struct OnceEvent<T> {
    rx: Option<oneshot::Receiver<T>>,
    rejects: bool,
}

impl<T: std::fmt::Debug> OnceEvent<T> {
    pub fn resolving(rx: oneshot::Receiver<T>) -> Self {
        Self { rx: Some(rx), rejects: false }
    }

    pub fn rejecting(rx: oneshot::Receiver<T>) -> Self {
        Self { rx: Some(rx), rejects: true }
    }

    /// Dispose the adapter early, dropping (and so unsubscribing) the
    /// receiver without waiting for an emission.
    pub fn dispose(&mut self) {
        self.rx.take();
    }
}

impl<T: std::fmt::Debug + Unpin> Future for OnceEvent<T> {
    type Output = Result<T, StreamAdapterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(Err(StreamAdapterError::Disposed));
        };
        match Pin::new(rx).poll(cx) {
            Poll::Ready(Ok(value)) => {
                self.rx = None;
                if self.rejects {
                    Poll::Ready(Err(StreamAdapterError::Signaled(format!("{value:?}"))))
                } else {
                    Poll::Ready(Ok(value))
                }
            }
            Poll::Ready(Err(_)) => {
                self.rx = None;
                Poll::Ready(Err(StreamAdapterError::Canceled))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A broadcast channel adapted into a disposable async iterator with a
/// bounded ring buffer. Overflow drops the oldest undelivered item — this is
/// exactly `tokio::sync::broadcast`'s lagged-receiver behavior, so we report
/// it rather than panic, logging how many were dropped.
pub struct EventStream<T> {
    inner: Option<BroadcastStream<T>>,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    pub fn new(rx: broadcast::Receiver<T>) -> Self {
        Self { inner: Some(BroadcastStream::new(rx)) }
    }

    /// Recommended way to build the channel pair this adapter expects,
    /// applying the default ring-buffer capacity.
    pub fn channel() -> (broadcast::Sender<T>, Self) {
        Self::channel_with_capacity(DEFAULT_RING_CAPACITY)
    }

    pub fn channel_with_capacity(capacity: usize) -> (broadcast::Sender<T>, Self) {
        let (tx, rx) = broadcast::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Dispose the adapter, dropping (and so unsubscribing) the receiver.
    /// Idempotent: a second call is a no-op.
    pub fn dispose(&mut self) {
        self.inner.take();
    }
}

impl<T: Clone + Send + 'static> Stream for EventStream<T> {
    type Item = Result<T, StreamAdapterError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(inner).poll_next(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                tracing::warn!(skipped, "event stream ring buffer overflowed, dropping oldest");
                Poll::Ready(Some(Err(StreamAdapterError::Disposed)))
            }
            Poll::Ready(None) => {
                self.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
