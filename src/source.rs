//! The timer source facility: a cancellable, suspendable timer bound to a
//! [`Queue`].
//!
//! A source is driven by one background task that sleeps until the armed
//! deadline and then hands the bound callback to the queue. Configuration
//! lives behind a mutex that is never held across an await or a callback.
//! Every change to the handler or schedule bumps a generation number, and a
//! deadline only fires if the generation it was armed under is still current.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[cfg(feature = "logging")]
use log::{debug, trace, warn};
use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::callback::{from_fn, TimerCallback};
use crate::errors::TimerError;
use crate::interval::Interval;
use crate::queue::Queue;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Represents the state of a timer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Suspended,
    Cancelled,
}

/// Statistics for a timer source.
#[derive(Debug, Clone, Default)]
pub struct TimerStatistics {
    /// Number of times the callback has been handed to the queue.
    pub execution_count: usize,
    /// Total elapsed time since the source was created.
    pub elapsed_time: Duration,
    /// When the most recent firing happened.
    pub last_fired: Option<Instant>,
}

/// When a source fires next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub deadline: Instant,
    /// Period of a repeating schedule, `None` for one-shot.
    pub repeat: Option<Interval>,
    /// Slack the firing may take past `deadline`.
    pub leeway: Interval,
}

impl Schedule {
    /// The schedule after a firing at `now`, or `None` when it is spent.
    ///
    /// Repeating deadlines stay on the grid `deadline + k * period`; periods
    /// that have already gone by are skipped rather than fired in a burst.
    fn following(&self, now: Instant) -> Option<Schedule> {
        let period = self.repeat.filter(|p| p.is_positive())?.to_duration();
        let mut deadline = self.deadline + period;
        if deadline <= now {
            let step = period.as_nanos();
            let missed = (now - deadline).as_nanos() / step + 1;
            deadline += Duration::from_nanos((missed * step).min(u64::MAX as u128) as u64);
        }
        Some(Schedule { deadline, ..*self })
    }
}

struct Inner {
    handler: Option<Arc<dyn TimerCallback>>,
    schedule: Option<Schedule>,
    suspend_count: usize,
    cancelled: bool,
    generation: u64,
    execution_count: usize,
    last_fired: Option<Instant>,
}

impl Inner {
    fn reconfigured(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

struct Shared {
    id: u64,
    inner: Mutex<Inner>,
    changed: Notify,
    queue: Queue,
    handles: AtomicUsize,
    created: Instant,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A timer event source bound to a queue.
///
/// A new source starts suspended with no handler and no schedule. Bind a
/// handler, set a schedule and call [`TimerSource::resume`] to arm it; the
/// factories in [`crate::timer`] do all three at once.
///
/// Clones refer to the same source. Dropping every clone does not cancel an
/// armed source; call [`TimerSource::cancel`].
pub struct TimerSource {
    shared: Arc<Shared>,
}

impl TimerSource {
    /// Creates a suspended timer source whose callbacks run on `queue`.
    pub fn new(queue: &Queue) -> Self {
        let shared = Arc::new(Shared {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(Inner {
                handler: None,
                schedule: None,
                suspend_count: 1,
                cancelled: false,
                generation: 0,
                execution_count: 0,
                last_fired: None,
            }),
            changed: Notify::new(),
            queue: queue.clone(),
            handles: AtomicUsize::new(1),
            created: Instant::now(),
        });
        queue.runtime().spawn(drive(Arc::clone(&shared)));

        #[cfg(feature = "logging")]
        debug!("Timer source {} created on queue '{}'.", shared.id, queue.label());

        TimerSource { shared }
    }

    /// Identifier of this source, unique within the process.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn queue(&self) -> &Queue {
        &self.shared.queue
    }

    /// Replaces the callback run on each firing.
    pub fn set_event_handler<C>(&self, callback: C)
    where
        C: TimerCallback + 'static,
    {
        self.configure(|inner| inner.handler = Some(Arc::new(callback)));
    }

    /// Replaces the callback with a plain closure.
    pub fn set_event_handler_fn<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_event_handler(from_fn(f));
    }

    /// Arms the source to fire once at `deadline`.
    pub fn schedule_oneshot(&self, deadline: Instant, leeway: Interval) {
        self.configure(|inner| {
            inner.schedule = Some(Schedule {
                deadline,
                repeat: None,
                leeway,
            })
        });
    }

    /// Arms the source to fire at `deadline` and every `interval` after it.
    ///
    /// A non-positive `interval` fires once at `deadline` and then disarms.
    pub fn schedule_repeating(&self, deadline: Instant, interval: Interval, leeway: Interval) {
        #[cfg(feature = "logging")]
        if !interval.is_positive() {
            warn!(
                "Timer source {} given non-positive period {}; it will fire once.",
                self.shared.id, interval
            );
        }
        self.configure(|inner| {
            inner.schedule = Some(Schedule {
                deadline,
                repeat: Some(interval),
                leeway,
            })
        });
    }

    /// Stops the source from starting new firings until the matching
    /// [`TimerSource::resume`].
    ///
    /// Suspensions nest. A firing already handed to the queue still runs.
    pub fn suspend(&self) {
        let mut inner = self.shared.lock();
        if inner.cancelled {
            return;
        }
        inner.suspend_count += 1;
        drop(inner);
        self.shared.changed.notify_one();

        #[cfg(feature = "logging")]
        trace!("Timer source {} suspended.", self.shared.id);
    }

    /// Undoes one [`TimerSource::suspend`]. A deadline that passed while
    /// suspended fires right away.
    pub fn resume(&self) -> Result<(), TimerError> {
        let mut inner = self.shared.lock();
        if inner.cancelled {
            return Ok(());
        }
        if inner.suspend_count == 0 {
            return Err(TimerError::NotSuspended);
        }
        inner.suspend_count -= 1;
        let released = inner.suspend_count == 0;
        drop(inner);
        if released {
            self.shared.changed.notify_one();

            #[cfg(feature = "logging")]
            trace!("Timer source {} resumed.", self.shared.id);
        }
        Ok(())
    }

    /// Cancels the source. No firing starts afterwards; a callback already
    /// handed to the queue may still run. Cancelling again has no effect.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        if inner.cancelled {
            return;
        }
        inner.cancelled = true;
        inner.reconfigured();
        inner.schedule = None;
        let handler = inner.handler.take();
        drop(inner);
        drop(handler);
        self.shared.changed.notify_one();

        #[cfg(feature = "logging")]
        debug!("Timer source {} cancelled.", self.shared.id);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().cancelled
    }

    pub fn state(&self) -> TimerState {
        let inner = self.shared.lock();
        if inner.cancelled {
            TimerState::Cancelled
        } else if inner.suspend_count > 0 {
            TimerState::Suspended
        } else {
            TimerState::Running
        }
    }

    /// The pending schedule, if any.
    pub fn schedule(&self) -> Option<Schedule> {
        self.shared.lock().schedule
    }

    pub fn statistics(&self) -> TimerStatistics {
        let inner = self.shared.lock();
        TimerStatistics {
            execution_count: inner.execution_count,
            elapsed_time: self.shared.created.elapsed(),
            last_fired: inner.last_fired,
        }
    }

    fn configure(&self, apply: impl FnOnce(&mut Inner)) {
        let mut inner = self.shared.lock();
        if inner.cancelled {
            #[cfg(feature = "logging")]
            debug!("Ignoring reconfiguration of cancelled timer source {}.", self.shared.id);
            return;
        }
        apply(&mut inner);
        inner.reconfigured();
        drop(inner);
        self.shared.changed.notify_one();
    }
}

impl Clone for TimerSource {
    fn clone(&self) -> Self {
        self.shared.handles.fetch_add(1, Ordering::AcqRel);
        TimerSource {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for TimerSource {
    fn drop(&mut self) {
        if self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.changed.notify_one();
        }
    }
}

impl std::fmt::Debug for TimerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSource")
            .field("id", &self.shared.id)
            .field("queue", &self.shared.queue)
            .field("state", &self.state())
            .field("schedule", &self.schedule())
            .finish()
    }
}

/// Background task of one source.
///
/// Exits when the source is cancelled, or when every handle is gone and the
/// source can no longer fire.
async fn drive(shared: Arc<Shared>) {
    loop {
        let armed = {
            let inner = shared.lock();
            if inner.cancelled {
                break;
            }
            match inner.schedule {
                Some(schedule) if inner.suspend_count == 0 => Some((schedule, inner.generation)),
                _ => None,
            }
        };

        let Some((schedule, generation)) = armed else {
            if shared.handles.load(Ordering::Acquire) == 0 {
                break;
            }
            shared.changed.notified().await;
            continue;
        };

        tokio::select! {
            _ = shared.changed.notified() => continue,
            _ = time::sleep_until(schedule.deadline) => {}
        }

        let handler = {
            let mut inner = shared.lock();
            if inner.cancelled {
                break;
            }
            if inner.suspend_count > 0 || inner.generation != generation {
                continue;
            }
            let now = Instant::now();

            #[cfg(feature = "logging")]
            if now.duration_since(schedule.deadline) > schedule.leeway.to_duration() {
                trace!(
                    "Timer source {} fired {:?} past its deadline, beyond leeway {}.",
                    shared.id,
                    now.duration_since(schedule.deadline),
                    schedule.leeway
                );
            }

            inner.schedule = schedule.following(now);
            let handler = inner.handler.clone();
            if handler.is_some() {
                inner.execution_count += 1;
                inner.last_fired = Some(now);
            }
            handler
        };

        if let Some(handler) = handler {
            shared.queue.run(handler).await;
        }
    }

    #[cfg(feature = "logging")]
    debug!("Timer source {} driver stopped.", shared.id);
}
