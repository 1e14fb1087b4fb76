//! One-call timer construction: bind a handler, set a schedule and start.
//!
//! Every timer returned from here is already armed. The parameterized forms
//! capture a value that is handed back to the handler on each firing and can
//! be swapped atomically together with the handler by the reschedule methods.

#[cfg(feature = "logging")]
use log::debug;
use tokio::time::Instant;

use crate::callback::{from_fn, with_parameter, TimerCallback};
use crate::interval::Interval;
use crate::queue::Queue;
use crate::source::TimerSource;

/// Options shared by all timer shapes.
///
/// `leeway` defaults to zero and `queue` to [`Queue::global`].
#[derive(Debug, Clone)]
pub struct TimerBuilder {
    interval: Interval,
    leeway: Interval,
    queue: Option<Queue>,
}

impl TimerBuilder {
    pub fn new(interval: impl Into<Interval>) -> Self {
        TimerBuilder {
            interval: interval.into(),
            leeway: Interval::ZERO,
            queue: None,
        }
    }

    /// Slack the firing may take past each deadline.
    pub fn leeway(mut self, leeway: impl Into<Interval>) -> Self {
        self.leeway = leeway.into();
        self
    }

    /// Queue the handler runs on.
    pub fn queue(mut self, queue: &Queue) -> Self {
        self.queue = Some(queue.clone());
        self
    }

    /// Fires `handler` once after the interval.
    pub fn single<F>(self, handler: F) -> TimerSource
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.single_callback(from_fn(handler))
    }

    /// Fires `callback` once after the interval.
    pub fn single_callback<C>(self, callback: C) -> TimerSource
    where
        C: TimerCallback + 'static,
    {
        let source = TimerSource::new(&self.resolve_queue());
        source.set_event_handler(callback);
        source.schedule_oneshot(self.interval.after(Instant::now()), self.leeway);
        source.resume().ok();

        #[cfg(feature = "logging")]
        debug!("Single-shot timer {} armed for {}.", source.id(), self.interval);
        source
    }

    /// Fires `handler(parameter)` once after the interval.
    pub fn single_with<T, F>(self, parameter: T, handler: F) -> TimerSource
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let source = TimerSource::new(&self.resolve_queue());
        source.reschedule_oneshot(self.interval, self.leeway, parameter, handler);
        source.resume().ok();
        source
    }

    /// Fires `handler` every interval, starting one interval from now.
    pub fn periodic<F>(self, handler: F) -> TimerSource
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.periodic_callback(from_fn(handler))
    }

    /// Fires `callback` every interval, starting one interval from now.
    pub fn periodic_callback<C>(self, callback: C) -> TimerSource
    where
        C: TimerCallback + 'static,
    {
        let source = TimerSource::new(&self.resolve_queue());
        source.set_event_handler(callback);
        source.schedule_repeating(
            self.interval.after(Instant::now()),
            self.interval,
            self.leeway,
        );
        source.resume().ok();

        #[cfg(feature = "logging")]
        debug!("Periodic timer {} armed every {}.", source.id(), self.interval);
        source
    }

    /// Fires `handler(parameter)` every interval, starting one interval from now.
    pub fn periodic_with<T, F>(self, parameter: T, handler: F) -> TimerSource
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let source = TimerSource::new(&self.resolve_queue());
        source.reschedule_repeating(self.interval, self.leeway, parameter, handler);
        source.resume().ok();
        source
    }

    fn resolve_queue(&self) -> Queue {
        self.queue.clone().unwrap_or_else(Queue::global)
    }
}

/// Runs `handler` on `queue` once, `interval` from now.
pub fn single_timer<F>(interval: impl Into<Interval>, queue: &Queue, handler: F) -> TimerSource
where
    F: Fn() + Send + Sync + 'static,
{
    TimerBuilder::new(interval).queue(queue).single(handler)
}

/// Runs `handler(parameter)` on the global queue once, `interval` from now.
///
/// The global queue is concurrent: a handler that needs exclusion should take
/// its own lock and compare `parameter` against the latest expected value
/// before acting (see [`crate::Generation`]).
pub fn single_timer_with<T, F>(interval: impl Into<Interval>, parameter: T, handler: F) -> TimerSource
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    TimerBuilder::new(interval).single_with(parameter, handler)
}

/// Runs `handler` on `queue` every `interval`.
pub fn periodic_timer<F>(interval: impl Into<Interval>, queue: &Queue, handler: F) -> TimerSource
where
    F: Fn() + Send + Sync + 'static,
{
    TimerBuilder::new(interval).queue(queue).periodic(handler)
}

/// Runs `handler(parameter)` on the global queue every `interval`.
pub fn periodic_timer_with<T, F>(interval: impl Into<Interval>, parameter: T, handler: F) -> TimerSource
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    TimerBuilder::new(interval).periodic_with(parameter, handler)
}

impl TimerSource {
    /// Rebinds the handler with a new parameter and arms a single firing
    /// `interval` from now.
    ///
    /// The source is suspended while the handler and schedule are replaced, so
    /// the old handler never fires on the new schedule nor the new handler on
    /// the old one. A firing already handed to the queue may still deliver the
    /// previous parameter.
    pub fn reschedule_oneshot<T, F>(
        &self,
        interval: impl Into<Interval>,
        leeway: impl Into<Interval>,
        parameter: T,
        handler: F,
    ) where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let interval = interval.into();
        self.suspend();
        self.set_event_handler(with_parameter(parameter, handler));
        self.schedule_oneshot(interval.after(Instant::now()), leeway.into());
        self.resume().ok();

        #[cfg(feature = "logging")]
        debug!("Timer source {} rescheduled once in {}.", self.id(), interval);
    }

    /// Like [`TimerSource::reschedule_oneshot`], repeating every `interval`.
    pub fn reschedule_repeating<T, F>(
        &self,
        interval: impl Into<Interval>,
        leeway: impl Into<Interval>,
        parameter: T,
        handler: F,
    ) where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let interval = interval.into();
        self.suspend();
        self.set_event_handler(with_parameter(parameter, handler));
        self.schedule_repeating(interval.after(Instant::now()), interval, leeway.into());
        self.resume().ok();

        #[cfg(feature = "logging")]
        debug!("Timer source {} rescheduled every {}.", self.id(), interval);
    }
}
