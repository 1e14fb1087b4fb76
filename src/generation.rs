//! Generation counter for recognising stale timer callbacks.
//!
//! A rescheduled timer can still deliver a callback that was dispatched under
//! the previous schedule. Pass a [`Token`] from [`Generation::advance`] as the
//! timer parameter; the callback then checks it against the counter and does
//! nothing once a newer generation exists.
//!
//! ```
//! use std::sync::Arc;
//! use dispatch_timer::Generation;
//!
//! let generation = Arc::new(Generation::new());
//! let first = generation.advance();
//! let second = generation.advance();
//! assert!(!generation.is_current(first));
//! assert!(generation.try_claim(second));
//! assert!(!generation.try_claim(second));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of a [`Generation`] counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl Token {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Generation {
    current: AtomicU64,
}

impl Generation {
    pub const fn new() -> Self {
        Generation {
            current: AtomicU64::new(0),
        }
    }

    /// Starts a new generation, invalidating every earlier token.
    pub fn advance(&self) -> Token {
        Token(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn current(&self) -> Token {
        Token(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: Token) -> bool {
        self.current() == token
    }

    /// Consumes `token` if it is still current.
    ///
    /// On success the counter moves past `token`, so of all the callbacks
    /// holding the same token only one gets `true`.
    pub fn try_claim(&self, token: Token) -> bool {
        self.current
            .compare_exchange(token.0, token.0 + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn advance_invalidates_older_tokens() {
        let generation = Generation::new();
        let a = generation.advance();
        assert!(generation.is_current(a));
        let b = generation.advance();
        assert!(!generation.is_current(a));
        assert!(generation.is_current(b));
        assert!(b > a);
    }

    #[test]
    fn exactly_one_claim_succeeds_across_threads() {
        let generation = Arc::new(Generation::new());
        let token = generation.advance();

        let winners: usize = (0..8)
            .map(|_| {
                let generation = Arc::clone(&generation);
                std::thread::spawn(move || generation.try_claim(token))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert!(!generation.is_current(token));
    }
}
