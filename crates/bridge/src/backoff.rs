use std::time::Duration;

/// Default first retry delay after a connection drop.
pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Ceiling for the doubling retry delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Backoff(Duration),
}

/// Exponential backoff for connector reconnects.
///
/// Each connector owns one policy. `next_delay` yields the wait before the
/// next attempt, doubling up to the ceiling; `reset` returns to `Idle` after
/// a successful connect so the next failure starts the ladder over. Delays
/// are deterministic, no jitter is applied.
#[derive(Debug)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    state: State,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            state: State::Idle,
        }
    }

    /// Delay to wait before the next connect attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.state {
            State::Idle => self.initial,
            State::Backoff(current) => current,
        };
        self.state = State::Backoff(delay.saturating_mul(2).min(self.max));
        delay
    }

    /// Forget accumulated backoff after a successful connect.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Delay the next `next_delay` call would return, without advancing.
    pub fn current_delay(&self) -> Duration {
        match self.state {
            State::Idle => self.initial,
            State::Backoff(current) => current,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(INITIAL_RECONNECT_DELAY, MAX_RECONNECT_DELAY)
    }
}
