// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped, single-shot resource disposal.
//!
//! Two primitives cover everything the pool/worker lifecycle needs:
//!
//! - [`ScopedHandle`] / [`AsyncScopedHandle`] wrap a single value with a
//!   disposal closure that runs *at most once* no matter how many times
//!   `release`/`release().await` is invoked.
//! - [`DisposableStack`] / [`AsyncDisposableStack`] compose bare disposal
//!   closures into a LIFO stack; the stack's own disposal unwinds them in
//!   reverse acquisition order. `start()` pushes as it acquires resources so
//!   `stop()` can unwind deterministically even on partial failure.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

type BoxFuture<'a, O> = Pin<Box<dyn Future<Output = O> + Send + 'a>>;

/// A value paired with a disposal closure that runs at most once.
pub struct ScopedHandle<T> {
    inner: Option<T>,
    dispose: Option<Box<dyn FnOnce(T) + Send>>,
}

impl<T> ScopedHandle<T> {
    pub fn new(value: T, dispose: impl FnOnce(T) + Send + 'static) -> Self {
        Self { inner: Some(value), dispose: Some(Box::new(dispose)) }
    }

    /// Borrow the wrapped value. Returns `None` once released.
    pub fn get(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.inner.as_mut()
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Run the disposal closure. Idempotent: the second and later calls are
    /// no-ops because the value and closure were already taken.
    pub fn release(&mut self) {
        if let (Some(value), Some(dispose)) = (self.inner.take(), self.dispose.take()) {
            dispose(value);
        }
    }
}

impl<T> Drop for ScopedHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A LIFO stack of disposal closures. Disposing the stack runs every
/// registered closure in reverse registration order, then clears the stack
/// so a second `dispose()` is a no-op.
#[derive(Default)]
pub struct DisposableStack {
    items: Vec<Box<dyn FnOnce() + Send>>,
}

impl DisposableStack {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Register a closure to run when this stack unwinds.
    pub fn push(&mut self, dispose: impl FnOnce() + Send + 'static) {
        self.items.push(Box::new(dispose));
    }

    /// Adopt a [`ScopedHandle`] so the stack's unwind also releases it.
    pub fn adopt<T: Send + 'static>(&mut self, mut handle: ScopedHandle<T>) {
        self.push(move || handle.release());
    }

    /// Unwind in reverse acquisition order. Idempotent.
    pub fn dispose(&mut self) {
        while let Some(item) = self.items.pop() {
            item();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Drop for DisposableStack {
    fn drop(&mut self) {
        self.dispose();
    }
}

enum AsyncState<T> {
    Pending { value: T, dispose: Box<dyn FnOnce(T) -> BoxFuture<'static, ()> + Send> },
    Released,
}

/// Async counterpart of [`ScopedHandle`]. Disposal is awaited; concurrent
/// `release().await` callers serialize on the same internal lock, so they
/// effectively share one in-flight disposal rather than racing to run it
/// twice.
pub struct AsyncScopedHandle<T> {
    state: Arc<AsyncMutex<AsyncState<T>>>,
}

impl<T> Clone for AsyncScopedHandle<T> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<T: Send + 'static> AsyncScopedHandle<T> {
    pub fn new<F, Fut>(value: T, dispose: F) -> Self
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let dispose: Box<dyn FnOnce(T) -> BoxFuture<'static, ()> + Send> =
            Box::new(move |v| Box::pin(dispose(v)));
        Self { state: Arc::new(AsyncMutex::new(AsyncState::Pending { value, dispose })) }
    }

    /// Run the disposal closure at most once; later or concurrent callers
    /// wait for the lock and then observe `Released`, so they return once
    /// the single in-flight disposal has completed.
    pub async fn release(&self) {
        let mut guard = self.state.lock().await;
        let state = std::mem::replace(&mut *guard, AsyncState::Released);
        if let AsyncState::Pending { value, dispose } = state {
            dispose(value).await;
        }
    }

    pub async fn is_released(&self) -> bool {
        matches!(*self.state.lock().await, AsyncState::Released)
    }

    /// Access the wrapped value if it hasn't been released yet.
    pub async fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.state.lock().await;
        match &mut *guard {
            AsyncState::Pending { value, .. } => Some(f(value)),
            AsyncState::Released => None,
        }
    }
}

/// A LIFO stack of async disposal closures, used by `start()`/`stop()` to
/// unwind resources (transport server, accepted socket, child-editor launch
/// handle) deterministically even when a teardown step fails.
#[derive(Default)]
pub struct AsyncDisposableStack {
    items: Vec<Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>>,
}

impl AsyncDisposableStack {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push<F, Fut>(&mut self, dispose: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.items.push(Box::new(move || Box::pin(dispose())));
    }

    pub fn adopt<T: Send + 'static>(&mut self, handle: AsyncScopedHandle<T>) {
        self.push(move || async move { handle.release().await });
    }

    /// Unwind in reverse acquisition order, awaiting each step in turn.
    /// Idempotent: a second call finds an empty stack and returns
    /// immediately, which is what makes `stop()` safe to call twice.
    pub async fn dispose(&mut self) {
        while let Some(item) = self.items.pop() {
            item().await;
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn scoped_handle_disposes_at_most_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut handle = ScopedHandle::new(42, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.release();
        handle.release();
        handle.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_handle_disposes_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        {
            let _handle = ScopedHandle::new((), move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disposable_stack_unwinds_in_reverse_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut stack = DisposableStack::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            stack.push(move || order.lock().push(i));
        }
        stack.dispose();
        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn disposable_stack_dispose_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut stack = DisposableStack::new();
        stack.push(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        stack.dispose();
        stack.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_scoped_handle_disposes_at_most_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = AsyncScopedHandle::new(42, move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        let h2 = handle.clone();
        tokio::join!(handle.release(), h2.release());
        handle.release().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_disposable_stack_unwinds_in_reverse_order() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let mut stack = AsyncDisposableStack::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            stack.push(move || async move {
                order.lock().await.push(i);
            });
        }
        stack.dispose().await;
        assert_eq!(*order.lock().await, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn async_disposable_stack_dispose_is_idempotent() {
        let mut stack = AsyncDisposableStack::new();
        stack.dispose().await;
        assert!(stack.is_empty());
        stack.dispose().await;
    }
}
