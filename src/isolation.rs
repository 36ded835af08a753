//! Error-isolation boundary
//!
//! [`consume`] builds a stream inside a spawned task and redirects every
//! failure of its call graph into the stream's own failure channel: panics
//! while building or polling it, and errors reported through the
//! [`ErrorReporter`] handed to the factory.

use futures_util::stream::StreamExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{StreamError, StreamResult};
use crate::readable::Readable;

/// Explicit error channel into an isolation boundary
///
/// Clone it into any task or callback spawned by the factory; whatever is
/// reported first fails the isolated stream.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    sender: mpsc::UnboundedSender<StreamError>,
}

impl ErrorReporter {
    /// Report a failure. Returns `false` once the boundary is gone.
    pub fn report(&self, error: impl Into<StreamError>) -> bool {
        self.sender.send(error.into()).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the boundary stopped listening for reports
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

enum Event<T> {
    Reported(StreamError),
    Step(Option<std::thread::Result<StreamResult<T>>>),
}

/// Build a stream with `factory` inside an isolation boundary
///
/// The stream is consumed immediately on a spawned task; the returned
/// [`Readable`] replays what it produced. Any captured failure is delivered
/// on a later scheduler turn as the returned stream's single failure. Errors
/// reported after the isolated stream completed are ignored.
///
/// Must be called from within a tokio runtime.
pub fn consume<T, F>(factory: F) -> Readable<T>
where
    F: FnOnce(ErrorReporter) -> Readable<T> + Send + 'static,
    T: Send + 'static,
{
    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let (forward, output) = mpsc::unbounded_channel::<StreamResult<T>>();

    tokio::spawn(async move {
        let reporter = ErrorReporter { sender: report_tx };
        let built = panic::catch_unwind(AssertUnwindSafe(move || factory(reporter)));
        let readable = match built {
            Ok(readable) => readable,
            Err(payload) => {
                let message = panic_message(payload);
                log::warn!("consume: factory panicked: {}", message);
                tokio::task::yield_now().await;
                let _ = forward.send(Err(StreamError::Panicked(message)));
                return;
            }
        };

        let mut guarded = AssertUnwindSafe(readable).catch_unwind();
        loop {
            let event = tokio::select! {
                biased;
                Some(error) = reports.recv() => Event::Reported(error),
                step = guarded.next() => Event::Step(step),
            };

            match event {
                Event::Reported(error) => {
                    log::debug!("consume: captured reported failure: {}", error);
                    tokio::task::yield_now().await;
                    let _ = forward.send(Err(error));
                    return;
                }
                Event::Step(None) => return,
                Event::Step(Some(Ok(Ok(value)))) => {
                    if forward.send(Ok(value)).is_err() {
                        log::trace!("consume: output dropped, stopping");
                        return;
                    }
                }
                Event::Step(Some(Ok(Err(error)))) => {
                    let _ = forward.send(Err(error));
                    return;
                }
                Event::Step(Some(Err(payload))) => {
                    let message = panic_message(payload);
                    log::warn!("consume: stream panicked: {}", message);
                    tokio::task::yield_now().await;
                    let _ = forward.send(Err(StreamError::Panicked(message)));
                    return;
                }
            }
        }
    });

    Readable::from_stream(UnboundedReceiverStream::new(output))
}
