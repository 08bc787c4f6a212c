//! Inter-cycle scheduling.
//!
//! The poll loop asks its [`Ticker`] for permission to run the next cycle.
//! Waits are a fixed delay after the previous cycle finished: there is no
//! wall-clock grid, no jitter, and no catch-up after an overrun.

#![allow(missing_docs)]

use std::thread;
use std::time::{Duration, Instant};

use crate::daemon::signals::SignalHandler;

/// Sleep granularity while waiting, bounding shutdown latency.
const SLICE: Duration = Duration::from_millis(250);

pub trait Ticker {
    /// Block until the next cycle is due. `false` means stop the loop.
    fn wait(&mut self) -> bool;
}

/// Production ticker: fixed delay, interrupted by a shutdown request.
pub struct IntervalTicker {
    interval: Duration,
    signals: SignalHandler,
}

impl IntervalTicker {
    #[must_use]
    pub fn new(interval: Duration, signals: SignalHandler) -> Self {
        Self { interval, signals }
    }
}

impl Ticker for IntervalTicker {
    fn wait(&mut self) -> bool {
        let deadline = Instant::now() + self.interval;
        loop {
            if self.signals.should_shutdown() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLICE.min(deadline - now));
        }
    }
}

/// Allows a fixed number of further cycles without sleeping.
#[derive(Debug, Clone, Copy)]
pub struct CountedTicker {
    remaining: usize,
}

impl CountedTicker {
    #[must_use]
    pub const fn new(cycles: usize) -> Self {
        Self { remaining: cycles }
    }
}

impl Ticker for CountedTicker {
    fn wait(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}
