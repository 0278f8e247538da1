//! Tick pacing and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag, checked between ticks.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Paces the loop at a fixed frame rate.
///
/// A tick that overruns its slot is not made up for: the next deadline is
/// rebased on the current time, so a slow model lowers the effective rate
/// instead of causing a burst of catch-up ticks.
#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    next: Option<Instant>,
    ticks: u64,
}

impl FrameScheduler {
    pub fn new(target_fps: u32) -> Self {
        let fps = target_fps.max(1) as u64;
        Self {
            interval: Duration::from_micros(1_000_000 / fps),
            next: None,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Block until the next tick is due. The first call returns immediately.
    ///
    /// Returns false without sleeping once `stop` is set.
    pub fn wait(&mut self, stop: &StopSignal) -> bool {
        if stop.is_stopped() {
            return false;
        }
        let now = Instant::now();
        if let Some(next) = self.next {
            if next > now {
                std::thread::sleep(next - now);
            }
        }
        let now = Instant::now();
        self.next = Some(match self.next {
            Some(next) if next + self.interval > now => next + self.interval,
            _ => now + self.interval,
        });
        self.ticks += 1;
        !stop.is_stopped()
    }
}
