//! Source adapters
//!
//! Wrap a sequence or a producer function as a pull-driven stage. Each source
//! runs its producer on the first pull and then completes, so pulling an
//! exhausted or failed source emits nothing further.

use async_trait::async_trait;
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;

use crate::error::StreamResult;
use crate::readable::Readable;
use crate::stage::{defer_failure, Outlet, Stage};

struct FromValues<I> {
    values: Option<I>,
}

#[async_trait]
impl<I> Stage for FromValues<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    type In = Infallible;
    type Out = I::Item;

    async fn on_pull(&mut self, outlet: &Outlet<I::Item>) -> StreamResult<()> {
        if let Some(values) = self.values.take() {
            for value in values {
                outlet.push(value);
            }
        }
        outlet.complete();
        Ok(())
    }
}

/// Emit every element of `values`, in order, then complete
///
/// # Examples
/// ```
/// use stream_util::*;
/// use futures_util::stream::StreamExt;
///
/// # async fn example() {
/// let values = from_values(vec![1, 2, 3])
///     .map(|item| item.unwrap())
///     .collect::<Vec<_>>()
///     .await;
/// assert_eq!(values, vec![1, 2, 3]);
/// # }
/// ```
pub fn from_values<I>(values: I) -> Readable<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    Readable::from_stage(FromValues {
        values: Some(values.into_iter()),
    })
}

struct ReadSync<F, O> {
    producer: Option<F>,
    _out: PhantomData<fn() -> O>,
}

#[async_trait]
impl<F, O> Stage for ReadSync<F, O>
where
    F: FnOnce(&Outlet<O>) -> StreamResult<()> + Send + 'static,
    O: Send + 'static,
{
    type In = Infallible;
    type Out = O;

    async fn on_pull(&mut self, outlet: &Outlet<O>) -> StreamResult<()> {
        if let Some(producer) = self.producer.take() {
            producer(outlet)?;
        }
        outlet.complete();
        Ok(())
    }
}

/// Run `producer` once on the first pull, then complete
///
/// The producer may push any number of values through the outlet. Returning
/// `Err` fails the stage instead of completing it.
pub fn read_sync<O, F>(producer: F) -> Readable<O>
where
    F: FnOnce(&Outlet<O>) -> StreamResult<()> + Send + 'static,
    O: Send + 'static,
{
    Readable::from_stage(ReadSync {
        producer: Some(producer),
        _out: PhantomData,
    })
}

struct ReadAsync<F, Fut, O> {
    producer: Option<F>,
    _out: PhantomData<fn() -> (Fut, O)>,
}

#[async_trait]
impl<F, Fut, O> Stage for ReadAsync<F, Fut, O>
where
    F: FnOnce(Outlet<O>) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
    O: Send + 'static,
{
    type In = Infallible;
    type Out = O;

    async fn on_pull(&mut self, outlet: &Outlet<O>) -> StreamResult<()> {
        if let Some(producer) = self.producer.take() {
            if let Err(error) = producer(outlet.clone()).await {
                return defer_failure(error).await;
            }
        }
        outlet.complete();
        Ok(())
    }
}

/// Run the asynchronous `producer` once on the first pull, then complete
///
/// The producer may push any number of times between its own suspension
/// points; pushed values flow downstream while it is still running. A
/// failure surfaces on a later scheduler turn.
///
/// # Examples
/// ```
/// use stream_util::*;
/// use std::time::Duration;
///
/// # async fn example() {
/// let sink = read_async(|outlet: Outlet<u32>| async move {
///     outlet.push(1);
///     tokio::time::sleep(Duration::from_millis(1)).await;
///     outlet.push(2);
///     Ok(())
/// })
/// .connect(to_array());
///
/// assert_eq!(sink.await.unwrap(), vec![1, 2]);
/// # }
/// ```
pub fn read_async<O, F, Fut>(producer: F) -> Readable<O>
where
    F: FnOnce(Outlet<O>) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
    O: Send + 'static,
{
    Readable::from_stage(ReadAsync {
        producer: Some(producer),
        _out: PhantomData,
    })
}
