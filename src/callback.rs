//! Callbacks bound to a timer source.

use async_trait::async_trait;

use crate::errors::TimerError;

/// A trait for timer callbacks.
#[async_trait]
pub trait TimerCallback: Send + Sync {
    /// The function to execute when the timer triggers.
    async fn execute(&self) -> Result<(), TimerError>;
}

/// Adapts a zero-argument closure into a [`TimerCallback`].
pub struct FromFn<F> {
    f: F,
}

/// Wraps `f` so it can be bound as a timer callback.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn() + Send + Sync + 'static,
{
    FromFn { f }
}

#[async_trait]
impl<F> TimerCallback for FromFn<F>
where
    F: Fn() + Send + Sync + 'static,
{
    async fn execute(&self) -> Result<(), TimerError> {
        (self.f)();
        Ok(())
    }
}

/// A closure paired with the parameter captured when it was bound.
///
/// Each firing hands the closure a clone of the parameter, so a repeating
/// timer delivers the same value until it is rebound.
pub struct WithParameter<T, F> {
    parameter: T,
    f: F,
}

/// Binds `parameter` to `f`.
pub fn with_parameter<T, F>(parameter: T, f: F) -> WithParameter<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    WithParameter { parameter, f }
}

impl<T, F> WithParameter<T, F> {
    /// The captured parameter.
    pub fn parameter(&self) -> &T {
        &self.parameter
    }
}

#[async_trait]
impl<T, F> TimerCallback for WithParameter<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    async fn execute(&self) -> Result<(), TimerError> {
        (self.f)(self.parameter.clone());
        Ok(())
    }
}
