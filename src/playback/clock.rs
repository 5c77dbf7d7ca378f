use std::time::Duration;

use crate::foundation::{config::loop_cycle, error::SheetResult};

/// Position on the ping-pong curve for `elapsed` time, in `[0, 1]`.
///
/// The curve rises linearly from 0 to 1 over `playback_duration`, then falls back to 0 over
/// the next `playback_duration`, and repeats.
pub fn ping_pong_progress(elapsed: Duration, playback_duration: Duration) -> f64 {
    let dur = playback_duration.as_nanos();
    if dur == 0 {
        return 0.0;
    }
    let cycle_position = elapsed.as_nanos() % (2 * dur);
    let phase = cycle_position as f64 / dur as f64;
    if phase <= 1.0 { phase } else { 2.0 - phase }
}

/// The two frames to composite for one tick and how far to dissolve into the second.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct FramePair {
    pub current: usize,
    pub next: usize,
    /// Weight of `next`, in `[0, 1)`.
    pub blend: f64,
}

impl FramePair {
    pub fn at_progress(progress: f64, total_frames: usize) -> Self {
        if total_frames == 0 {
            return Self {
                current: 0,
                next: 0,
                blend: 0.0,
            };
        }
        let last = total_frames - 1;
        let raw = progress.clamp(0.0, 1.0) * last as f64;
        let current = (raw.floor() as usize).min(last);
        let next = (raw.ceil() as usize).min(last);
        Self {
            current,
            next,
            blend: (raw - current as f64).clamp(0.0, 1.0),
        }
    }
}

/// Monotonic animation clock for the ping-pong loop.
///
/// Timestamps are host-supplied durations since an arbitrary monotonic epoch, so the clock
/// itself never reads the system time.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    base_loop: Duration,
    speed: f64,
    /// Animation time banked before `anchor`.
    banked: Duration,
    /// Host time the clock last resumed; `None` while paused or not started.
    anchor: Option<Duration>,
    started: bool,
}

impl PlaybackClock {
    pub fn new(base_loop: Duration, speed: f64) -> SheetResult<Self> {
        loop_cycle(base_loop, speed)?;
        Ok(Self {
            base_loop,
            speed,
            banked: Duration::ZERO,
            anchor: None,
            started: false,
        })
    }

    /// Reset the phase to the start of the loop. `playing` decides whether time advances.
    pub fn restart(&mut self, now: Duration, playing: bool) {
        self.banked = Duration::ZERO;
        self.anchor = playing.then_some(now);
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// `base_loop / speed`: the time of one forward sweep.
    pub fn playback_duration(&self) -> Duration {
        self.base_loop.div_f64(self.speed)
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        match self.anchor {
            Some(anchor) => self.banked + now.saturating_sub(anchor),
            None => self.banked,
        }
    }

    pub fn pause(&mut self, now: Duration) {
        if let Some(anchor) = self.anchor.take() {
            self.banked += now.saturating_sub(anchor);
        }
    }

    pub fn resume(&mut self, now: Duration) {
        if self.started && self.anchor.is_none() {
            self.anchor = Some(now);
        }
    }

    /// Change speed without a visible jump: the current position in the cycle is kept.
    pub fn set_speed(&mut self, speed: f64, now: Duration) -> SheetResult<()> {
        let new_cycle = loop_cycle(self.base_loop, speed)?;
        let old_cycle = 2 * self.playback_duration().as_nanos();
        let fraction = if old_cycle == 0 {
            0.0
        } else {
            (self.elapsed(now).as_nanos() % old_cycle) as f64 / old_cycle as f64
        };

        self.speed = speed;
        self.banked = new_cycle.mul_f64(fraction);
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
        Ok(())
    }

    /// Jump to `progress` on the forward sweep.
    pub fn seek_progress(&mut self, progress: f64, now: Duration) {
        self.banked = self.playback_duration().mul_f64(progress.clamp(0.0, 1.0));
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
        self.started = true;
    }

    pub fn progress(&self, now: Duration) -> f64 {
        ping_pong_progress(self.elapsed(now), self.playback_duration())
    }

    pub fn frame_pair(&self, now: Duration, total_frames: usize) -> FramePair {
        FramePair::at_progress(self.progress(now), total_frames)
    }
}
