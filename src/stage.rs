//! Stage core
//!
//! Every adapter in this crate is a plain value implementing [`Stage`]. A
//! single driver runs any stage as a stream: it asks a source for values with
//! `on_pull`, hands each upstream value to `on_push`, and calls `on_flush`
//! once upstream completes. Hooks emit through an [`Outlet`].
//!
//! The driver keeps at most one hook outstanding per stage. The guard is the
//! [`StageState`] machine itself: a hook only starts through a transition out
//! of [`StageState::Idle`], and a request made in any other state is dropped.

use async_stream::stream;
use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures_util::pin_mut;
use futures_util::stream::{BoxStream, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{StreamError, StreamResult};
use crate::stream_configuration::StageConfig;

/// Boxed stream of stage output, the transport every driver produces
pub type StageStream<T> = BoxStream<'static, StreamResult<T>>;

/// Lifecycle of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Waiting for the next pull or upstream value
    Idle = 0,
    /// A pull hook is outstanding
    Pulling = 1,
    /// A push hook is outstanding
    Pushing = 2,
    /// The flush hook is outstanding
    Flushing = 3,
    /// Completed normally
    Ended = 4,
    /// Failed
    Errored = 5,
}

impl StageState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StageState::Ended | StageState::Errored)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StageState::Idle,
            1 => StageState::Pulling,
            2 => StageState::Pushing,
            3 => StageState::Flushing,
            4 => StageState::Ended,
            _ => StageState::Errored,
        }
    }
}

/// Capability interface of a stage
///
/// Sources override [`Stage::on_pull`] (and use [`std::convert::Infallible`]
/// as `In`); transforms override [`Stage::on_push`] and optionally
/// [`Stage::on_flush`]. Returning `Err` from any hook fails the stage.
#[async_trait]
pub trait Stage: Send + 'static {
    type In: Send + 'static;
    type Out: Send + 'static;

    /// Produce values on demand. Call [`Outlet::complete`] once exhausted;
    /// the driver pulls again otherwise.
    async fn on_pull(&mut self, outlet: &Outlet<Self::Out>) -> StreamResult<()> {
        outlet.complete();
        Ok(())
    }

    /// Handle one upstream value.
    async fn on_push(&mut self, _item: Self::In, _outlet: &Outlet<Self::Out>) -> StreamResult<()> {
        Err(StreamError::Unsupported("push"))
    }

    /// Upstream completed; emit anything still held back.
    async fn on_flush(&mut self, _outlet: &Outlet<Self::Out>) -> StreamResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<S> Stage for Box<S>
where
    S: Stage + ?Sized,
{
    type In = S::In;
    type Out = S::Out;

    async fn on_pull(&mut self, outlet: &Outlet<Self::Out>) -> StreamResult<()> {
        (**self).on_pull(outlet).await
    }

    async fn on_push(&mut self, item: Self::In, outlet: &Outlet<Self::Out>) -> StreamResult<()> {
        (**self).on_push(item, outlet).await
    }

    async fn on_flush(&mut self, outlet: &Outlet<Self::Out>) -> StreamResult<()> {
        (**self).on_flush(outlet).await
    }
}

/// State and accounting shared by a stage's outlets and its driver
struct Control {
    state: AtomicU8,
    pending: AtomicUsize,
    high_water_mark: usize,
    label: String,
}

impl Control {
    fn new(config: &StageConfig) -> Self {
        Self {
            state: AtomicU8::new(StageState::Idle as u8),
            pending: AtomicUsize::new(0),
            high_water_mark: config.high_water_mark.max(1),
            label: config.display_label().to_string(),
        }
    }

    fn state(&self) -> StageState {
        StageState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `from -> to`. Fails when the stage is not in `from`.
    fn transition(&self, from: StageState, to: StageState) -> bool {
        match self.state.compare_exchange(
            from as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                log::trace!("{}: {:?} -> {:?}", self.label, from, to);
                true
            }
            Err(actual) => {
                log::trace!(
                    "{}: refusing {:?} -> {:?}, stage is {:?}",
                    self.label,
                    from,
                    to,
                    StageState::from_u8(actual)
                );
                false
            }
        }
    }

    /// Enter a terminal state. Fails when the stage already terminated.
    fn terminate(&self, to: StageState) -> bool {
        let terminated = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                if StageState::from_u8(raw).is_terminal() {
                    None
                } else {
                    Some(to as u8)
                }
            })
            .is_ok();
        if terminated {
            log::debug!("{}: {:?}", self.label, to);
        }
        terminated
    }
}

enum Signal<T> {
    Item(T),
    Fail(StreamError),
}

/// Emitting side of a stage, handed to every hook
///
/// Cloneable so asynchronous producers can move it into their futures.
pub struct Outlet<T> {
    sender: UnboundedSender<Signal<T>>,
    control: Arc<Control>,
}

impl<T> Clone for Outlet<T> {
    fn clone(&self) -> Self {
        Outlet {
            sender: self.sender.clone(),
            control: Arc::clone(&self.control),
        }
    }
}

impl<T> fmt::Debug for Outlet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outlet")
            .field("label", &self.control.label)
            .field("state", &self.control.state())
            .field("pending", &self.control.pending.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T> Outlet<T> {
    /// Emit one value downstream.
    ///
    /// Returns the advisory acceptance signal: `false` once the values waiting
    /// to be forwarded reach the high-water mark, or when the stage has
    /// already terminated (the value is then dropped).
    pub fn push(&self, value: T) -> bool {
        if self.control.state().is_terminal() {
            log::debug!("{}: dropping value pushed after termination", self.control.label);
            return false;
        }
        let pending = self.control.pending.fetch_add(1, Ordering::AcqRel) + 1;
        if self.sender.unbounded_send(Signal::Item(value)).is_err() {
            self.control.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        pending < self.control.high_water_mark
    }

    /// Fail the stage. Values pushed earlier are still delivered first;
    /// nothing is delivered after. No-op once the stage terminated.
    pub fn fail(&self, error: impl Into<StreamError>) {
        let error = error.into();
        if self.control.terminate(StageState::Errored) {
            let _ = self.sender.unbounded_send(Signal::Fail(error));
        } else {
            log::debug!(
                "{}: ignoring failure after termination: {}",
                self.control.label,
                error
            );
        }
    }

    /// End the stage normally. Later pushes are dropped.
    pub fn complete(&self) {
        self.control.terminate(StageState::Ended);
    }

    pub fn state(&self) -> StageState {
        self.control.state()
    }

    pub fn is_terminated(&self) -> bool {
        self.control.state().is_terminal()
    }
}

/// Receiving side of a stage's outlet, owned by the driver
struct Inlet<T> {
    receiver: UnboundedReceiver<Signal<T>>,
    control: Arc<Control>,
}

impl<T> Inlet<T> {
    fn release(&self) {
        self.control.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

fn wire<T>(config: &StageConfig) -> (Outlet<T>, Inlet<T>) {
    let (sender, receiver) = mpsc::unbounded();
    let control = Arc::new(Control::new(config));
    (
        Outlet {
            sender,
            control: Arc::clone(&control),
        },
        Inlet { receiver, control },
    )
}

/// Surface an asynchronous failure on a later scheduler turn
pub(crate) async fn defer_failure<T>(error: StreamError) -> StreamResult<T> {
    tokio::task::yield_now().await;
    Err(error)
}

enum Step<T> {
    Signal(Option<Signal<T>>),
    Settled(StreamResult<()>),
}

/// Run one hook to completion, forwarding whatever it emits meanwhile.
///
/// Yields at most one `Err`, always last.
fn pump<'a, T>(
    hook: futures::future::BoxFuture<'a, StreamResult<()>>,
    inlet: &'a mut Inlet<T>,
) -> BoxStream<'a, StreamResult<T>>
where
    T: Send + 'a,
{
    stream! {
        let mut hook = hook;
        let outcome = loop {
            let step = tokio::select! {
                biased;
                signal = inlet.receiver.next() => Step::Signal(signal),
                outcome = &mut hook => Step::Settled(outcome),
            };
            match step {
                Step::Signal(Some(Signal::Item(value))) => {
                    inlet.release();
                    yield Ok(value);
                }
                Step::Signal(Some(Signal::Fail(error))) => {
                    yield Err(error);
                    return;
                }
                Step::Signal(None) => break hook.await,
                Step::Settled(outcome) => break outcome,
            }
        };

        // Pushes made right before the hook settled.
        while let Ok(signal) = inlet.receiver.try_recv() {
            match signal {
                Signal::Item(value) => {
                    inlet.release();
                    yield Ok(value);
                }
                Signal::Fail(error) => {
                    yield Err(error);
                    return;
                }
            }
        }

        if let Err(error) = outcome {
            if inlet.control.terminate(StageState::Errored) {
                yield Err(error);
            } else {
                log::debug!(
                    "{}: dropping error raised after termination: {}",
                    inlet.control.label,
                    error
                );
            }
        }
    }
    .boxed()
}

/// Run `stage` as a stream.
///
/// With no upstream the stage is a source and is pulled until it terminates.
/// With an upstream every value goes through `on_push`, and upstream
/// completion triggers `on_flush` followed by completion. An upstream failure
/// is forwarded as this stage's failure.
pub(crate) fn drive<S>(
    upstream: Option<StageStream<S::In>>,
    stage: S,
    config: StageConfig,
) -> StageStream<S::Out>
where
    S: Stage,
{
    stream! {
        let mut stage = stage;
        let mut upstream = upstream;
        let (outlet, mut inlet) = wire::<S::Out>(&config);

        loop {
            let (phase, hook) = match upstream.as_mut() {
                None => {
                    if !outlet.control.transition(StageState::Idle, StageState::Pulling) {
                        return;
                    }
                    (StageState::Pulling, stage.on_pull(&outlet))
                }
                Some(input) => match input.next().await {
                    Some(Ok(item)) => {
                        if !outlet.control.transition(StageState::Idle, StageState::Pushing) {
                            return;
                        }
                        (StageState::Pushing, stage.on_push(item, &outlet))
                    }
                    Some(Err(error)) => {
                        outlet.control.terminate(StageState::Errored);
                        yield Err(error);
                        return;
                    }
                    None => {
                        if !outlet.control.transition(StageState::Idle, StageState::Flushing) {
                            return;
                        }
                        (StageState::Flushing, stage.on_flush(&outlet))
                    }
                },
            };

            let mut produced = 0usize;
            let steps = pump(hook, &mut inlet);
            pin_mut!(steps);
            while let Some(step) = steps.next().await {
                if step.is_err() {
                    yield step;
                    return;
                }
                produced += 1;
                yield step;
            }

            if phase == StageState::Flushing {
                outlet.control.terminate(StageState::Ended);
                return;
            }
            if !outlet.control.transition(phase, StageState::Idle) {
                // The hook completed the stage.
                return;
            }
            if produced == 0 && phase == StageState::Pulling {
                tokio::task::yield_now().await;
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_from_expected_state() {
        let control = Control::new(&StageConfig::default());
        assert!(control.transition(StageState::Idle, StageState::Pulling));
        // A second pull while one is outstanding is refused.
        assert!(!control.transition(StageState::Idle, StageState::Pulling));
        assert!(control.transition(StageState::Pulling, StageState::Idle));
        assert_eq!(control.state(), StageState::Idle);
    }

    #[test]
    fn terminal_states_are_final() {
        let control = Control::new(&StageConfig::default());
        assert!(control.terminate(StageState::Ended));
        assert!(!control.terminate(StageState::Errored));
        assert!(!control.transition(StageState::Ended, StageState::Idle));
        assert_eq!(control.state(), StageState::Ended);
    }

    #[test]
    fn push_reports_high_water_mark() {
        let config = StageConfig::default().with_high_water_mark(2);
        let (outlet, inlet) = wire::<u32>(&config);
        assert!(outlet.push(1));
        assert!(!outlet.push(2));
        inlet.release();
        inlet.release();
        assert!(outlet.push(3));
    }

    #[test]
    fn push_after_completion_is_dropped() {
        let (outlet, mut inlet) = wire::<u32>(&StageConfig::default());
        assert!(outlet.push(1));
        outlet.complete();
        assert!(!outlet.push(2));
        assert!(matches!(inlet.receiver.try_recv(), Ok(Signal::Item(1))));
        assert!(inlet.receiver.try_recv().is_err());
    }

    #[test]
    fn fail_after_completion_is_ignored() {
        let (outlet, mut inlet) = wire::<u32>(&StageConfig::default());
        outlet.complete();
        outlet.fail("late");
        assert_eq!(outlet.state(), StageState::Ended);
        assert!(inlet.receiver.try_recv().is_err());
    }
}
