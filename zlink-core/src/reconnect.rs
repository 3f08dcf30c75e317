//! Reconnection utilities with exponential backoff support.
//!
//! This module provides utilities for managing socket reconnection with
//! exponential backoff, following libzmq patterns.

use std::time::Duration;
use crate::options::SocketOptions;

/// Reconnection state tracker for managing connection attempts and backoff.
///
/// This helper tracks the number of reconnection attempts and calculates
/// the appropriate backoff delay using exponential backoff.
///
/// # Example
///
/// ```rust
/// use zlink_core::reconnect::ReconnectState;
/// use zlink_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let options = SocketOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(100))
///     .with_reconnect_ivl_max(Duration::from_secs(10));
///
/// let mut reconnect = ReconnectState::new(&options);
///
/// // First attempt uses base interval plus jitter in [0, base]
/// assert!(reconnect.next_delay() >= Duration::from_millis(100));
///
/// // Subsequent attempts use exponential backoff
/// assert!(reconnect.next_delay() >= Duration::from_millis(200));
/// assert!(reconnect.next_delay() >= Duration::from_millis(400));
///
/// // Reset on successful connection
/// reconnect.reset();
/// assert!(reconnect.next_delay() >= Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    /// Base reconnection interval
    base_interval: Duration,
    /// Maximum reconnection interval
    max_interval: Duration,
    /// Current reconnection attempt (0 = first attempt)
    attempt: u32,
    /// Current backoff interval
    current_interval: Duration,
}

impl ReconnectState {
    /// Create a new reconnection state tracker from socket options.
    pub const fn new(options: &SocketOptions) -> Self {
        Self {
            base_interval: options.reconnect_ivl,
            max_interval: options.reconnect_ivl_max,
            attempt: 0,
            current_interval: options.reconnect_ivl,
        }
    }

    /// Get the delay for the next reconnection attempt.
    ///
    /// This calculates the exponential backoff delay based on the number
    /// of previous attempts, plus a random jitter in `[0, base_interval]`
    /// so that many sockets reconnecting to the same endpoint after an
    /// outage don't all retry in lockstep. The delay doubles with each
    /// attempt until it reaches `reconnect_ivl_max`.
    ///
    /// # Returns
    ///
    /// The duration to wait before the next reconnection attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_interval + self.jitter();

        // Calculate next interval with exponential backoff
        self.attempt += 1;
        self.current_interval = self.base_interval * (1_u32 << self.attempt.min(10));

        // Cap at max interval
        if self.current_interval > self.max_interval {
            self.current_interval = self.max_interval;
        }

        delay
    }

    fn jitter(&self) -> Duration {
        if self.base_interval.is_zero() {
            return Duration::ZERO;
        }
        use rand::Rng;
        let max_jitter_ms = self.base_interval.as_millis().max(1) as u64;
        let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
        Duration::from_millis(jitter_ms)
    }

    /// Reset the reconnection state after a successful connection.
    ///
    /// This resets the attempt counter and interval back to the base values.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_interval = self.base_interval;
    }

    /// Get the current attempt number.
    #[inline]
    #[must_use] 
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Get the base reconnection interval.
    #[inline]
    #[must_use] 
    pub const fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// Get the maximum reconnection interval.
    #[inline]
    #[must_use] 
    pub const fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Get the current reconnection interval.
    #[inline]
    #[must_use] 
    pub const fn current_interval(&self) -> Duration {
        self.current_interval
    }
}

/// Error type for reconnection operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectError {
    /// Maximum reconnection attempts reached
    MaxAttemptsReached { attempts: u32 },
    /// Connection failed with I/O error
    ConnectionFailed { message: String },
    /// Reconnection cancelled by user
    Cancelled,
}

impl std::fmt::Display for ReconnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxAttemptsReached { attempts } => {
                write!(f, "Maximum reconnection attempts reached: {attempts}")
            }
            Self::ConnectionFailed { message } => {
                write!(f, "Connection failed: {message}")
            }
            Self::Cancelled => {
                write!(f, "Reconnection cancelled")
            }
        }
    }
}

impl std::error::Error for ReconnectError {}

#[cfg(test)]
mod tests {
    use super::*;

    /// `next_delay` always adds up to `base_interval` of jitter, so assert
    /// on the range `[base, base + base]` rather than an exact value.
    fn assert_in_backoff_range(delay: Duration, base: Duration, jitter_base: Duration) {
        assert!(delay >= base, "{delay:?} should be >= {base:?}");
        assert!(
            delay <= base + jitter_base,
            "{delay:?} should be <= {base:?} + {jitter_base:?}"
        );
    }

    #[test]
    fn test_exponential_backoff() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_secs(10));

        let mut state = ReconnectState::new(&options);
        let base = Duration::from_millis(100);

        // First attempt: base interval
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(100), base);
        assert_eq!(state.attempt(), 1);

        // Second attempt: doubled
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(200), base);
        assert_eq!(state.attempt(), 2);

        // Third attempt: doubled again
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(400), base);
        assert_eq!(state.attempt(), 3);

        // Fourth attempt
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(800), base);
        assert_eq!(state.attempt(), 4);
    }

    #[test]
    fn test_max_interval_cap() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_millis(500));

        let mut state = ReconnectState::new(&options);
        let base = Duration::from_millis(100);

        assert_in_backoff_range(state.next_delay(), Duration::from_millis(100), base);
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(200), base);
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(400), base);

        // Should be capped at max (jitter still applies on top of the cap)
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(500), base);
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(500), base);
    }

    #[test]
    fn test_reset() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_secs(10));

        let mut state = ReconnectState::new(&options);
        let base = Duration::from_millis(100);

        // Make some attempts
        state.next_delay();
        state.next_delay();
        state.next_delay();
        assert_eq!(state.attempt(), 3);

        // Reset
        state.reset();
        assert_eq!(state.attempt(), 0);
        assert_in_backoff_range(state.next_delay(), Duration::from_millis(100), base);
    }

    #[test]
    fn test_state_accessors() {
        let options = SocketOptions::default()
            .with_reconnect_ivl(Duration::from_millis(250))
            .with_reconnect_ivl_max(Duration::from_secs(5));

        let state = ReconnectState::new(&options);

        assert_eq!(state.base_interval(), Duration::from_millis(250));
        assert_eq!(state.max_interval(), Duration::from_secs(5));
        assert_eq!(state.current_interval(), Duration::from_millis(250));
        assert_eq!(state.attempt(), 0);
    }
}
