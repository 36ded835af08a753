//! Transform adapters
//!
//! Per-value functions wrapped as push-driven stages. Synchronous failures
//! surface immediately; asynchronous ones on a later scheduler turn. All of
//! them handle one value at a time and preserve input order, except
//! [`parallel_map_async`] which keeps several calls in flight (order is still
//! preserved).

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

use crate::error::StreamResult;
use crate::readable::{Downstream, Readable, Transform};
use crate::stage::{defer_failure, Outlet, Stage};
use crate::stream_configuration::StageConfig;

struct MapSync<F, I, O> {
    f: F,
    _types: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<F, I, O> Stage for MapSync<F, I, O>
where
    F: FnMut(I) -> StreamResult<O> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type In = I;
    type Out = O;

    async fn on_push(&mut self, item: I, outlet: &Outlet<O>) -> StreamResult<()> {
        let mapped = (self.f)(item)?;
        outlet.push(mapped);
        Ok(())
    }
}

/// Map every value through `f`, one output per input
pub fn map_sync<I, O, F>(f: F) -> Transform<I, O>
where
    F: FnMut(I) -> StreamResult<O> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    Transform::new(MapSync {
        f,
        _types: PhantomData,
    })
}

struct MapAsync<F, Fut, I, O> {
    f: F,
    _types: PhantomData<fn(I) -> (Fut, O)>,
}

#[async_trait]
impl<F, Fut, I, O> Stage for MapAsync<F, Fut, I, O>
where
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type In = I;
    type Out = O;

    async fn on_push(&mut self, item: I, outlet: &Outlet<O>) -> StreamResult<()> {
        match (self.f)(item).await {
            Ok(mapped) => {
                outlet.push(mapped);
                Ok(())
            }
            Err(error) => defer_failure(error).await,
        }
    }
}

/// Map every value through the asynchronous `f`, one output per input
pub fn map_async<I, O, F, Fut>(f: F) -> Transform<I, O>
where
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    Transform::new(MapAsync {
        f,
        _types: PhantomData,
    })
}

struct FilterSync<F, T> {
    predicate: F,
    _types: PhantomData<fn(T)>,
}

#[async_trait]
impl<F, T> Stage for FilterSync<F, T>
where
    F: FnMut(&T) -> StreamResult<bool> + Send + 'static,
    T: Send + 'static,
{
    type In = T;
    type Out = T;

    async fn on_push(&mut self, item: T, outlet: &Outlet<T>) -> StreamResult<()> {
        if (self.predicate)(&item)? {
            outlet.push(item);
        }
        Ok(())
    }
}

/// Keep the values for which `predicate` holds
pub fn filter_sync<T, F>(predicate: F) -> Transform<T, T>
where
    F: FnMut(&T) -> StreamResult<bool> + Send + 'static,
    T: Send + 'static,
{
    Transform::new(FilterSync {
        predicate,
        _types: PhantomData,
    })
}

struct FilterAsync<F, Fut, T> {
    predicate: F,
    _types: PhantomData<fn(T) -> Fut>,
}

#[async_trait]
impl<F, Fut, T> Stage for FilterAsync<F, Fut, T>
where
    F: FnMut(&T) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<bool>> + Send + 'static,
    T: Send + 'static,
{
    type In = T;
    type Out = T;

    async fn on_push(&mut self, item: T, outlet: &Outlet<T>) -> StreamResult<()> {
        let verdict = (self.predicate)(&item);
        match verdict.await {
            Ok(true) => {
                outlet.push(item);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(error) => defer_failure(error).await,
        }
    }
}

/// Keep the values for which the asynchronous `predicate` holds
///
/// The predicate borrows the value only to build its future; the future
/// itself must own whatever it needs.
pub fn filter_async<T, F, Fut>(predicate: F) -> Transform<T, T>
where
    F: FnMut(&T) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<bool>> + Send + 'static,
    T: Send + 'static,
{
    Transform::new(FilterAsync {
        predicate,
        _types: PhantomData,
    })
}

struct ThroughSync<F, I, O> {
    f: F,
    _types: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<F, I, O> Stage for ThroughSync<F, I, O>
where
    F: FnMut(I, &Outlet<O>) -> StreamResult<()> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type In = I;
    type Out = O;

    async fn on_push(&mut self, item: I, outlet: &Outlet<O>) -> StreamResult<()> {
        (self.f)(item, outlet)
    }
}

/// Hand every value to `f` together with the outlet
///
/// `f` may push zero or more values, and may report a logical failure with
/// [`Outlet::fail`] instead of returning `Err`.
pub fn through_sync<I, O, F>(f: F) -> Transform<I, O>
where
    F: FnMut(I, &Outlet<O>) -> StreamResult<()> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    Transform::new(ThroughSync {
        f,
        _types: PhantomData,
    })
}

struct ThroughAsync<F, Fut, I, O> {
    f: F,
    _types: PhantomData<fn(I) -> (Fut, O)>,
}

#[async_trait]
impl<F, Fut, I, O> Stage for ThroughAsync<F, Fut, I, O>
where
    F: FnMut(I, Outlet<O>) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type In = I;
    type Out = O;

    async fn on_push(&mut self, item: I, outlet: &Outlet<O>) -> StreamResult<()> {
        match (self.f)(item, outlet.clone()).await {
            Ok(()) => Ok(()),
            Err(error) => defer_failure(error).await,
        }
    }
}

/// Asynchronous [`through_sync`]; the next value is handed over once the
/// returned future resolves.
pub fn through_async<I, O, F, Fut>(f: F) -> Transform<I, O>
where
    F: FnMut(I, Outlet<O>) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    Transform::new(ThroughAsync {
        f,
        _types: PhantomData,
    })
}

struct PushValues<T> {
    pending: Vec<T>,
}

#[async_trait]
impl<T> Stage for PushValues<T>
where
    T: PartialEq + Send + 'static,
{
    type In = T;
    type Out = T;

    async fn on_push(&mut self, item: T, outlet: &Outlet<T>) -> StreamResult<()> {
        if let Some(index) = self.pending.iter().position(|value| *value == item) {
            self.pending.remove(index);
        }
        outlet.push(item);
        Ok(())
    }

    async fn on_flush(&mut self, outlet: &Outlet<T>) -> StreamResult<()> {
        for value in self.pending.drain(..) {
            outlet.push(value);
        }
        Ok(())
    }
}

/// Forward every value, then append those of `values` that never passed
///
/// A value passing through removes one equal entry from `values`.
pub fn push_values<T>(values: Vec<T>) -> Transform<T, T>
where
    T: PartialEq + Send + 'static,
{
    Transform::new(PushValues { pending: values })
}

struct Observe<F, T> {
    observer: F,
    _types: PhantomData<fn(T)>,
}

#[async_trait]
impl<F, T> Stage for Observe<F, T>
where
    F: FnMut(&T) + Send + 'static,
    T: Send + 'static,
{
    type In = T;
    type Out = T;

    async fn on_push(&mut self, item: T, outlet: &Outlet<T>) -> StreamResult<()> {
        (self.observer)(&item);
        outlet.push(item);
        Ok(())
    }
}

/// Call `observer` on every value, then forward it unchanged
pub fn log_passthrough<T, F>(observer: F) -> Transform<T, T>
where
    F: FnMut(&T) + Send + 'static,
    T: Send + 'static,
{
    Transform::new(Observe {
        observer,
        _types: PhantomData,
    })
    .with_label("log")
}

/// [`log_passthrough`] writing every value to the `log` facade at info level
pub fn log_values<T>() -> Transform<T, T>
where
    T: Debug + Send + 'static,
{
    log_passthrough(|value: &T| log::info!("{:?}", value))
}

/// Concurrent [`map_async`]; see [`parallel_map_async`]
pub struct ParallelMap<F> {
    f: F,
    config: StageConfig,
}

impl<F> ParallelMap<F> {
    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }
}

impl<I, O, F, Fut> Downstream<I> for ParallelMap<F>
where
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = Readable<O>;

    fn attach(self, upstream: Readable<I>) -> Readable<O> {
        let ParallelMap { mut f, config } = self;
        let concurrency = config.concurrency.max(1);
        log::debug!(
            "{}: mapping with up to {} calls in flight",
            config.display_label(),
            concurrency
        );

        let calls = upstream
            .into_stream()
            .map(move |item| {
                let call = item.map(&mut f);
                async move {
                    match call {
                        Ok(pending) => match pending.await {
                            Ok(mapped) => Ok(mapped),
                            Err(error) => defer_failure(error).await,
                        },
                        Err(error) => Err(error),
                    }
                }
            })
            .buffered(concurrency);
        Readable::from_stream(calls)
    }
}

/// Map through the asynchronous `f` with up to `concurrency` calls in flight
///
/// Output order equals input order. The first failure ends the stream.
pub fn parallel_map_async<I, O, F, Fut>(concurrency: usize, f: F) -> ParallelMap<F>
where
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    ParallelMap {
        f,
        config: StageConfig::default().with_concurrency(concurrency),
    }
}
