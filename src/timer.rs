use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Time source for the handshake poll loop.
///
/// `sleep` blocks the calling thread.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Fixed interval polling bounded by a ceiling.
pub struct PollSchedule {
    start: Instant,
    interval: Duration,
    ceiling: Duration,
    polls: usize,
}

impl PollSchedule {
    pub fn new(start: Instant, interval: Duration, ceiling: Duration) -> Self {
        Self {
            start,
            interval,
            ceiling,
            polls: 0,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.ceiling
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn attempt(&mut self) {
        self.polls += 1;
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl fmt::Debug for PollSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSchedule")
            .field("interval", &self.interval)
            .field("ceiling", &self.ceiling)
            .field("polls", &self.polls)
            .finish()
    }
}
