//! Composition surface: readable stage output, boxed transforms and `connect`

use async_stream::stream;
use futures_core::Stream;
use futures_util::pin_mut;
use futures_util::stream::StreamExt;
use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::StreamResult;
use crate::stage::{drive, Stage, StageStream};
use crate::stream_configuration::StageConfig;

/// Output of a stage, observable as a `Stream` of `StreamResult<T>`
///
/// Yields at most one `Err` and ends right after it. Polling after the end
/// keeps returning `None`.
pub struct Readable<T> {
    inner: StageStream<T>,
}

impl<T> Readable<T>
where
    T: Send + 'static,
{
    /// Run a source stage with the default configuration
    pub fn from_stage<S>(stage: S) -> Self
    where
        S: Stage<In = Infallible, Out = T>,
    {
        Self::from_stage_with(stage, StageConfig::default())
    }

    pub fn from_stage_with<S>(stage: S, config: StageConfig) -> Self
    where
        S: Stage<In = Infallible, Out = T>,
    {
        Readable {
            inner: drive(None, stage, config),
        }
    }

    /// Adopt any stream of results, cutting it off after its first failure
    pub fn from_stream<St>(source: St) -> Self
    where
        St: Stream<Item = StreamResult<T>> + Send + 'static,
    {
        Readable {
            inner: stream! {
                pin_mut!(source);
                while let Some(item) = source.next().await {
                    let failed = item.is_err();
                    yield item;
                    if failed {
                        break;
                    }
                }
            }
            .boxed(),
        }
    }

    /// Wire this output into `downstream`, returning whatever it exposes
    /// (a [`Readable`] for transforms, a result handle for sinks).
    pub fn connect<D>(self, downstream: D) -> D::Output
    where
        D: Downstream<T>,
    {
        downstream.attach(self)
    }

    pub fn into_stream(self) -> StageStream<T> {
        self.inner
    }
}

impl<T> Stream for Readable<T> {
    type Item = StreamResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readable").finish_non_exhaustive()
    }
}

/// Anything a [`Readable`] can be connected into
pub trait Downstream<I> {
    type Output;

    fn attach(self, upstream: Readable<I>) -> Self::Output;
}

/// A transform stage waiting for its upstream
pub struct Transform<I, O> {
    stage: Box<dyn Stage<In = I, Out = O>>,
    config: StageConfig,
}

impl<I, O> Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new<S>(stage: S) -> Self
    where
        S: Stage<In = I, Out = O>,
    {
        Transform {
            stage: Box::new(stage),
            config: StageConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.config = self.config.with_label(label);
        self
    }

    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.config = self.config.with_high_water_mark(high_water_mark);
        self
    }
}

impl<I, O> Downstream<I> for Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = Readable<O>;

    fn attach(self, upstream: Readable<I>) -> Readable<O> {
        Readable {
            inner: drive(Some(upstream.inner), self.stage, self.config),
        }
    }
}

impl<I, O> fmt::Debug for Transform<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
