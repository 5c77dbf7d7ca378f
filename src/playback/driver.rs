use std::{
    ops::ControlFlow,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::foundation::error::{SheetError, SheetResult};

/// Shared cancellation flag for one scheduled tick loop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    /// Ticks that started after their slot had already passed.
    pub late_ticks: u64,
    pub cancelled: bool,
}

/// Fixed-rate stand-in for a display refresh callback.
///
/// Each tick receives the monotonic time since the driver was created. Ticks that fall behind
/// are not replayed; the loop resynchronizes to the next slot.
#[derive(Debug)]
pub struct TickDriver {
    interval: Duration,
    epoch: Instant,
}

impl TickDriver {
    pub fn new(fps: u32) -> SheetResult<Self> {
        if fps == 0 {
            return Err(SheetError::validation("tick rate must be > 0 fps"));
        }
        Ok(Self {
            interval: Duration::from_secs(1) / fps,
            epoch: Instant::now(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Invoke `on_tick` at the fixed rate until it breaks, errors, or `token` is cancelled.
    pub fn run<F>(&self, token: &CancelToken, mut on_tick: F) -> SheetResult<TickStats>
    where
        F: FnMut(Duration) -> SheetResult<ControlFlow<()>>,
    {
        let mut stats = TickStats::default();
        let mut next_slot = self.now();

        loop {
            if token.is_cancelled() {
                stats.cancelled = true;
                tracing::debug!(ticks = stats.ticks, "tick loop cancelled");
                break;
            }

            let now = self.now();
            if now > next_slot + self.interval {
                stats.late_ticks += 1;
                next_slot = now;
            }

            stats.ticks += 1;
            if on_tick(now)?.is_break() {
                break;
            }

            next_slot += self.interval;
            let now = self.now();
            if next_slot > now {
                std::thread::sleep(next_slot - now);
            }
        }

        Ok(stats)
    }
}
