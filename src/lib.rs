//! # dispatch-timer
//! One-shot and repeating timers that are armed in a single call, with an
//! optional parameter for recognising callbacks made stale by a reschedule.

pub mod callback;
pub mod errors;
pub mod generation;
pub mod interval;
pub mod queue;
pub mod source;
pub mod timer;

pub use callback::{from_fn, with_parameter, TimerCallback};
pub use errors::TimerError;
pub use generation::{Generation, Token};
pub use interval::Interval;
pub use queue::Queue;
pub use source::{Schedule, TimerSource, TimerState, TimerStatistics};
pub use timer::{periodic_timer, periodic_timer_with, single_timer, single_timer_with, TimerBuilder};
