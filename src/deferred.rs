//! Single-settlement result slot
//!
//! A [`Deferred`] is the read side: cloneable, awaitable any number of times,
//! before or after settlement. The matching [`Resolver`] is the write side and
//! settles the slot at most once.

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::{StreamError, StreamResult};

/// Settlement state of a [`Deferred`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    Pending = 0,
    Fulfilled = 1,
    Rejected = 2,
}

impl DeferredState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => DeferredState::Fulfilled,
            2 => DeferredState::Rejected,
            _ => DeferredState::Pending,
        }
    }
}

/// Read side of a single-settlement future
pub struct Deferred<T> {
    state: Arc<AtomicU8>,
    result: Shared<BoxFuture<'static, StreamResult<T>>>,
}

/// Write side of a [`Deferred`]
///
/// Dropping an unsettled resolver rejects the deferred with
/// [`StreamError::Cancelled`].
pub struct Resolver<T> {
    state: Arc<AtomicU8>,
    sender: Option<oneshot::Sender<StreamResult<T>>>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a pending deferred together with its resolver
    pub fn pending() -> (Deferred<T>, Resolver<T>) {
        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(AtomicU8::new(0));
        let result = receiver
            .map(|settled| settled.unwrap_or(Err(StreamError::Cancelled)))
            .boxed()
            .shared();

        (
            Deferred {
                state: Arc::clone(&state),
                result,
            },
            Resolver {
                state,
                sender: Some(sender),
            },
        )
    }

    /// A deferred already fulfilled with `value`
    pub fn resolved(value: T) -> Self {
        let (deferred, mut resolver) = Self::pending();
        resolver.resolve(value);
        deferred
    }

    /// A deferred already rejected with `error`
    pub fn rejected(error: StreamError) -> Self {
        let (deferred, mut resolver) = Self::pending();
        resolver.reject(error);
        deferred
    }

    pub fn state(&self) -> DeferredState {
        match DeferredState::from_u8(self.state.load(Ordering::Acquire)) {
            // A reader may already hold the result while the resolver is
            // still publishing the state.
            DeferredState::Pending => match self.result.peek() {
                Some(Ok(_)) => DeferredState::Fulfilled,
                Some(Err(_)) => DeferredState::Rejected,
                None => DeferredState::Pending,
            },
            settled => settled,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state() != DeferredState::Pending
    }

    /// The settled result, or `None` while pending
    pub fn peek(&self) -> Option<StreamResult<T>> {
        if let Some(result) = self.result.peek() {
            return Some(result.clone());
        }
        if !self.is_settled() {
            return None;
        }
        // The state is published only after the result was sent.
        self.result.clone().now_or_never()
    }

    /// A future for the settled result that leaves this handle usable
    pub fn wait(&self) -> impl Future<Output = StreamResult<T>> + Send + 'static {
        self.result.clone()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred {
            state: Arc::clone(&self.state),
            result: self.result.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &DeferredState::from_u8(self.state.load(Ordering::Acquire)))
            .finish()
    }
}

impl<T> Future for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = StreamResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result).poll(cx)
    }
}

impl<T> Resolver<T> {
    /// Fulfil the deferred. Returns `false` if it was already settled.
    pub fn resolve(&mut self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the deferred. Returns `false` if it was already settled.
    pub fn reject(&mut self, error: StreamError) -> bool {
        self.settle(Err(error))
    }

    /// Settle with either outcome. Only the first call has any effect.
    pub fn settle(&mut self, result: StreamResult<T>) -> bool {
        let Some(sender) = self.sender.take() else {
            log::trace!("ignoring repeated settlement of deferred");
            return false;
        };
        let state = if result.is_ok() {
            DeferredState::Fulfilled
        } else {
            DeferredState::Rejected
        };
        // Every reader may be gone already; the settlement still counts.
        let _ = sender.send(result);
        self.state.store(state as u8, Ordering::Release);
        true
    }

    pub fn is_settled(&self) -> bool {
        self.sender.is_none()
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            log::debug!("resolver dropped before settlement; rejecting as cancelled");
            drop(sender);
            self.state
                .store(DeferredState::Rejected as u8, Ordering::Release);
        }
    }
}
