//! crates/dangdai_core/src/timer.rs
//!
//! Per-question stopwatch feeding `time_spent_ms` of each question result.

use chrono::{DateTime, Utc};

/// Source of "now". Production uses the system clock; tests drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A single-slot stopwatch: idle, or running since one recorded instant.
///
/// None of the operations fail. Elapsed times are clamped at zero if the clock
/// ever steps backwards.
#[derive(Debug)]
pub struct QuestionTimer<C: Clock = SystemClock> {
    clock: C,
    started_at: Option<DateTime<Utc>>,
    question_index: Option<usize>,
}

impl QuestionTimer<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for QuestionTimer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> QuestionTimer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            started_at: None,
            question_index: None,
        }
    }

    /// Records the current instant, replacing any running start.
    pub fn start(&mut self) {
        self.started_at = Some(self.clock.now());
    }

    /// Returns elapsed milliseconds and goes idle. Idle timers return 0.
    pub fn stop(&mut self) -> u64 {
        let elapsed = self.peek();
        self.started_at = None;
        elapsed
    }

    /// Elapsed milliseconds without stopping; 0 when idle.
    pub fn peek(&self) -> u64 {
        match self.started_at {
            Some(start) => (self.clock.now() - start).num_milliseconds().max(0) as u64,
            None => 0,
        }
    }

    /// Goes idle without reporting anything.
    pub fn reset(&mut self) {
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Tells the timer which question is on screen. The timer restarts once
    /// each time the index changes, in either direction, and on the first call.
    /// Returns whether it restarted.
    pub fn observe_question(&mut self, index: usize) -> bool {
        if self.question_index == Some(index) {
            return false;
        }
        self.question_index = Some(index);
        self.start();
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    /// Clock that only moves when told to.
    #[derive(Clone)]
    pub(crate) struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self(Arc::new(Mutex::new(Utc::now())))
        }

        pub(crate) fn advance_ms(&self, ms: i64) {
            *self.0.lock().unwrap() += Duration::milliseconds(ms);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn timer() -> (QuestionTimer<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (QuestionTimer::with_clock(clock.clone()), clock)
    }

    #[test]
    fn idle_timer_reports_zero() {
        let (mut t, _) = timer();
        assert_eq!(t.peek(), 0);
        assert_eq!(t.stop(), 0);
        assert!(!t.is_running());
    }

    #[test]
    fn second_stop_returns_zero() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance_ms(1500);
        assert_eq!(t.stop(), 1500);
        assert_eq!(t.stop(), 0);
    }

    #[test]
    fn peek_does_not_stop() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance_ms(420);
        let peeked = t.peek();
        let stopped = t.stop();
        assert_eq!(peeked, 420);
        assert_eq!(peeked, stopped);
    }

    #[test]
    fn restart_overwrites_previous_start() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance_ms(1000);
        t.start();
        clock.advance_ms(250);
        assert_eq!(t.stop(), 250);
    }

    #[test]
    fn reset_goes_idle() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance_ms(300);
        t.reset();
        assert!(!t.is_running());
        assert_eq!(t.stop(), 0);
    }

    #[test]
    fn clock_going_backwards_clamps_to_zero() {
        let (mut t, clock) = timer();
        t.start();
        clock.advance_ms(-50);
        assert_eq!(t.stop(), 0);
    }

    #[test]
    fn auto_starts_once_per_question_index() {
        let (mut t, clock) = timer();
        assert!(t.observe_question(0));
        clock.advance_ms(100);
        assert!(!t.observe_question(0));
        assert_eq!(t.peek(), 100);

        assert!(t.observe_question(1));
        assert_eq!(t.peek(), 0);
        clock.advance_ms(70);
        assert_eq!(t.stop(), 70);

        // Going back to an earlier question restarts too.
        assert!(t.observe_question(0));
        assert!(t.is_running());
    }
}
