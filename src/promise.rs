//! Promise bridge

use futures_util::stream::StreamExt;

use crate::deferred::Deferred;
use crate::readable::Readable;

/// Settle a [`Deferred`] with the outcome of `source`
///
/// Starts consuming `source` immediately on a spawned task, discarding its
/// values. Rejects on the first failure, resolves on completion; anything
/// after the first settlement is ignored.
///
/// Must be called from within a tokio runtime.
///
/// # Examples
/// ```
/// use stream_util::*;
///
/// # async fn example() {
/// let outcome = to_promise(
///     from_values(vec![1, 2]).connect(through_sync(|_: i32, outlet: &Outlet<i32>| {
///         outlet.fail("booum");
///         Ok(())
///     })),
/// );
/// assert_eq!(outcome.await.unwrap_err().to_string(), "booum");
/// # }
/// ```
pub fn to_promise<T>(mut source: Readable<T>) -> Deferred<()>
where
    T: Send + 'static,
{
    let (deferred, mut resolver) = Deferred::pending();

    tokio::spawn(async move {
        while let Some(step) = source.next().await {
            if let Err(error) = step {
                log::debug!("to_promise: rejecting with {}", error);
                resolver.reject(error);
                return;
            }
        }
        resolver.resolve(());
    });

    deferred
}
