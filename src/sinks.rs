//! Sink adapters
//!
//! A sink accumulates everything it receives and settles a [`Deferred`] with
//! the accumulation once upstream completes, or rejects it with the upstream
//! failure. Connecting a sink starts consuming the upstream right away on the
//! tokio runtime; the result handle can be taken before or after connecting.

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::deferred::{Deferred, Resolver};
use crate::error::StreamResult;
use crate::readable::{Downstream, Readable, Transform};
use crate::stage::{Outlet, Stage};
use crate::stream_configuration::StageConfig;

/// Drain `accumulated` on a spawned task and settle `resolver` with its
/// first value or its failure.
fn settle_on_completion<R>(accumulated: Readable<R>, mut resolver: Resolver<R>, label: String)
where
    R: Send + 'static,
{
    tokio::spawn(async move {
        let mut accumulated = accumulated;
        while let Some(step) = accumulated.next().await {
            match step {
                Ok(result) => {
                    log::debug!("{}: upstream completed, settling result", label);
                    resolver.resolve(result);
                }
                Err(error) => {
                    log::debug!("{}: upstream failed: {}", label, error);
                    resolver.reject(error);
                    return;
                }
            }
        }
    });
}

struct ArrayBuffer<T> {
    buffer: Vec<T>,
}

#[async_trait]
impl<T> Stage for ArrayBuffer<T>
where
    T: Send + 'static,
{
    type In = T;
    type Out = Vec<T>;

    async fn on_push(&mut self, item: T, _outlet: &Outlet<Vec<T>>) -> StreamResult<()> {
        self.buffer.push(item);
        Ok(())
    }

    async fn on_flush(&mut self, outlet: &Outlet<Vec<T>>) -> StreamResult<()> {
        outlet.push(std::mem::take(&mut self.buffer));
        Ok(())
    }
}

/// Sink collecting values, in arrival order, into a `Vec`
pub struct ToArray<T> {
    result: Deferred<Vec<T>>,
    resolver: Resolver<Vec<T>>,
    config: StageConfig,
}

impl<T> ToArray<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Handle on the collected values
    pub fn result(&self) -> Deferred<Vec<T>> {
        self.result.clone()
    }

    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }
}

impl<T> Downstream<T> for ToArray<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Deferred<Vec<T>>;

    fn attach(self, upstream: Readable<T>) -> Deferred<Vec<T>> {
        let ToArray {
            result,
            resolver,
            config,
        } = self;
        let label = config.label.clone().unwrap_or_else(|| "to_array".to_string());
        let accumulated = upstream.connect(
            Transform::new(ArrayBuffer { buffer: Vec::new() }).with_config(config),
        );
        settle_on_completion(accumulated, resolver, label);
        result
    }
}

/// Collect every value into a `Vec`
///
/// The result is a [`Deferred`], which hands every reader its own copy, so
/// values must be `Clone + Sync`. Wrap other values in an `Arc` first, e.g.
/// with `map_sync(|v| Ok(Arc::new(v)))`.
///
/// # Examples
/// ```
/// use stream_util::*;
///
/// # async fn example() {
/// let sink = to_array();
/// let collected = sink.result();
/// from_values(vec!["foo", "bar"]).connect(sink);
/// assert_eq!(collected.await.unwrap(), vec!["foo", "bar"]);
/// # }
/// ```
pub fn to_array<T>() -> ToArray<T>
where
    T: Clone + Send + Sync + 'static,
{
    let (result, resolver) = Deferred::pending();
    ToArray {
        result,
        resolver,
        config: StageConfig::default(),
    }
}

struct ObjectBuffer<M, K, V> {
    merged: HashMap<K, V>,
    _input: PhantomData<fn(M)>,
}

#[async_trait]
impl<M, K, V> Stage for ObjectBuffer<M, K, V>
where
    M: IntoIterator<Item = (K, V)> + Send + 'static,
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    type In = M;
    type Out = HashMap<K, V>;

    async fn on_push(&mut self, item: M, _outlet: &Outlet<HashMap<K, V>>) -> StreamResult<()> {
        self.merged.extend(item);
        Ok(())
    }

    async fn on_flush(&mut self, outlet: &Outlet<HashMap<K, V>>) -> StreamResult<()> {
        outlet.push(std::mem::take(&mut self.merged));
        Ok(())
    }
}

/// Sink shallow-merging key/value collections into one `HashMap`
pub struct ToObject<M, K, V> {
    result: Deferred<HashMap<K, V>>,
    resolver: Resolver<HashMap<K, V>>,
    config: StageConfig,
    _input: PhantomData<fn(M)>,
}

impl<M, K, V> ToObject<M, K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Handle on the merged mapping
    pub fn result(&self) -> Deferred<HashMap<K, V>> {
        self.result.clone()
    }

    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }
}

impl<M, K, V> Downstream<M> for ToObject<M, K, V>
where
    M: IntoIterator<Item = (K, V)> + Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Output = Deferred<HashMap<K, V>>;

    fn attach(self, upstream: Readable<M>) -> Deferred<HashMap<K, V>> {
        let ToObject {
            result,
            resolver,
            config,
            ..
        } = self;
        let label = config.label.clone().unwrap_or_else(|| "to_object".to_string());
        let accumulated = upstream.connect(
            Transform::new(ObjectBuffer {
                merged: HashMap::new(),
                _input: PhantomData,
            })
            .with_config(config),
        );
        settle_on_completion(accumulated, resolver, label);
        result
    }
}

/// Merge every key/value collection into one mapping; later keys win
///
/// As with [`to_array`], keys and values must be `Clone + Sync` because the
/// merged mapping is shared by every reader of the [`Deferred`].
pub fn to_object<M, K, V>() -> ToObject<M, K, V>
where
    M: IntoIterator<Item = (K, V)>,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let (result, resolver) = Deferred::pending();
    ToObject {
        result,
        resolver,
        config: StageConfig::default(),
        _input: PhantomData,
    }
}
