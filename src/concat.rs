//! Fan-in combinator

use async_stream::stream;
use futures_util::future;
use futures_util::stream::{self, select_all, StreamExt};

use crate::error::StreamResult;
use crate::readable::Readable;

enum Arrival<T> {
    Value(StreamResult<T>),
    End,
}

/// Merge `sources` into one output
///
/// On the first pull every source is consumed concurrently. Values are
/// forwarded as they arrive: each source keeps its own order, but sources
/// interleave arbitrarily. The first failure of any source fails the merged
/// output at once. The merged output completes exactly once, after every
/// source completed; with no sources it completes immediately.
///
/// # Examples
/// ```
/// use stream_util::*;
///
/// # async fn example() {
/// let merged = concat([from_values(vec![1, 2, 3]), from_values(vec![4, 5, 6])])
///     .connect(to_array());
/// let mut values = merged.await.unwrap();
/// values.sort();
/// assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
/// # }
/// ```
pub fn concat<T, I>(sources: I) -> Readable<T>
where
    I: IntoIterator<Item = Readable<T>>,
    T: Send + 'static,
{
    let sources: Vec<Readable<T>> = sources.into_iter().collect();
    let total = sources.len();

    Readable::from_stream(stream! {
        if total == 0 {
            return;
        }

        let mut merged = select_all(sources.into_iter().map(|source| {
            source
                .into_stream()
                .map(Arrival::Value)
                .chain(stream::once(future::ready(Arrival::End)))
                .boxed()
        }));
        let mut end_count = 0usize;

        while let Some(arrival) = merged.next().await {
            match arrival {
                Arrival::Value(Ok(value)) => yield Ok(value),
                Arrival::Value(Err(error)) => {
                    log::debug!("concat: source failed, failing merged output: {}", error);
                    yield Err(error);
                    return;
                }
                Arrival::End => {
                    end_count += 1;
                    log::trace!("concat: {}/{} sources ended", end_count, total);
                    if end_count == total {
                        return;
                    }
                }
            }
        }
    })
}
