use std::{sync::Arc, time::Duration};

use crate::{
    analysis::registry::{FrameRegistry, RegistryBuilder},
    engine::lifecycle::{Diagnostics, EngineState, TickOutcome},
    foundation::{
        config::{EngineConfig, PlaybackParams},
        error::{SheetError, SheetResult},
    },
    playback::{
        clock::{FramePair, PlaybackClock},
        driver::CancelToken,
    },
    render::{
        compositor::{Compositor, DrawReport},
        surface::FrameRGBA,
    },
    sheet::{
        layout::GridLayout,
        source::{SourceRef, SpriteSheet, load_source},
    },
};

enum Phase {
    Idle,
    /// Source assigned; loading happens on the next tick.
    Pending {
        source: SourceRef,
        layout: GridLayout,
    },
    Analyzing {
        builder: RegistryBuilder,
        started: Duration,
    },
    Ready {
        sheet: Arc<SpriteSheet>,
        registry: Arc<FrameRegistry>,
    },
    Failed {
        reason: String,
    },
}

/// Single-instance sprite-sheet player: owns one sheet, its registry, the playback clock
/// and the output surface.
///
/// The host drives it by calling [`SpritePlayer::tick`] once per display refresh (or from a
/// [`TickDriver`](crate::TickDriver)). Failures never escape `tick`; they land in
/// [`EngineState::Failed`] and a fallback placeholder is drawn instead.
pub struct SpritePlayer {
    cfg: EngineConfig,
    params: PlaybackParams,
    compositor: Option<Compositor>,
    phase: Phase,
    clock: PlaybackClock,
    tick_token: Option<CancelToken>,
    last_pair: Option<FramePair>,
    last_report: Option<DrawReport>,
}

impl SpritePlayer {
    /// Create an idle player. Invalid configuration is rejected; an unavailable surface is
    /// not an error but leaves the player permanently failed.
    pub fn new(cfg: EngineConfig) -> SheetResult<Self> {
        cfg.validate()?;
        let params = cfg.playback;
        let clock = PlaybackClock::new(cfg.base_loop(), params.speed)?;

        let (compositor, phase) = match Compositor::new(&cfg) {
            Ok(c) => (Some(c), Phase::Idle),
            Err(e) => {
                tracing::warn!(error = %e, "output surface unavailable; player disabled");
                (
                    None,
                    Phase::Failed {
                        reason: e.to_string(),
                    },
                )
            }
        };

        Ok(Self {
            cfg,
            params,
            compositor,
            phase,
            clock,
            tick_token: None,
            last_pair: None,
            last_report: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn params(&self) -> PlaybackParams {
        self.params
    }

    pub fn state(&self) -> EngineState {
        match &self.phase {
            Phase::Idle => EngineState::Idle,
            Phase::Pending { .. } | Phase::Analyzing { .. } => EngineState::Analyzing,
            Phase::Ready { .. } => EngineState::Ready,
            Phase::Failed { reason } => EngineState::Failed(reason.clone()),
        }
    }

    /// Registry of the current source, only once analysis has completed.
    pub fn registry(&self) -> Option<&FrameRegistry> {
        match &self.phase {
            Phase::Ready { registry, .. } => Some(registry),
            _ => None,
        }
    }

    /// Assign a new source. Discards the previous registry, cancels the scheduled tick loop
    /// and restarts analysis.
    pub fn set_source(&mut self, source: SourceRef, layout: GridLayout) {
        self.cancel_scheduled();
        self.last_pair = None;
        self.last_report = None;

        if self.compositor.is_none() {
            tracing::warn!("ignoring source assignment: no output surface");
            return;
        }

        tracing::info!(?source, %layout, "source assigned; analyzing");
        self.phase = Phase::Pending { source, layout };
    }

    /// Like [`SpritePlayer::set_source`] with a textual layout selector, which must be one of
    /// the supported grids. An unsupported selector leaves the player untouched.
    pub fn set_source_with_selector(
        &mut self,
        source: SourceRef,
        selector: &str,
    ) -> SheetResult<()> {
        let layout = GridLayout::parse(selector)?;
        self.set_source(source, layout);
        Ok(())
    }

    /// Drop the current source and return to `Idle`.
    pub fn clear_source(&mut self) {
        self.cancel_scheduled();
        self.last_pair = None;
        self.last_report = None;
        if self.compositor.is_some() {
            self.phase = Phase::Idle;
        }
    }

    /// Issue the cancellation token for a new tick loop, cancelling any previous one.
    pub fn schedule(&mut self) -> CancelToken {
        self.cancel_scheduled();
        let token = CancelToken::new();
        self.tick_token = Some(token.clone());
        token
    }

    /// Cancel the scheduled tick loop, if any.
    pub fn cancel_scheduled(&mut self) {
        if let Some(token) = self.tick_token.take() {
            token.cancel();
        }
    }

    /// Release the tick loop; the player stays inspectable but will not be driven again.
    pub fn dispose(&mut self) {
        self.cancel_scheduled();
        tracing::debug!("player disposed");
    }

    pub fn set_speed(&mut self, speed: f64, now: Duration) -> SheetResult<()> {
        self.clock.set_speed(speed, now)?;
        self.params.speed = speed;
        Ok(())
    }

    pub fn set_smoothing(&mut self, smoothing: bool) {
        self.params.smoothing = smoothing;
    }

    pub fn set_playing(&mut self, playing: bool, now: Duration) {
        self.params.playing = playing;
        if playing {
            self.clock.resume(now);
        } else {
            self.clock.pause(now);
        }
    }

    /// Jump to `progress` (0..1) on the forward sweep. Ignored until ready.
    pub fn seek_progress(&mut self, progress: f64, now: Duration) {
        if matches!(self.phase, Phase::Ready { .. }) {
            self.clock.seek_progress(progress, now);
        }
    }

    /// Current loop position, once playback has started.
    pub fn progress(&self, now: Duration) -> Option<f64> {
        match self.phase {
            Phase::Ready { .. } if self.clock.is_started() => Some(self.clock.progress(now)),
            _ => None,
        }
    }

    pub fn playback_duration(&self) -> Duration {
        self.clock.playback_duration()
    }

    /// Advance the engine by one host refresh at monotonic time `now`.
    pub fn tick(&mut self, now: Duration) -> TickOutcome {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        let (phase, outcome) = self.step(phase, now);
        self.phase = phase;
        outcome
    }

    fn step(&mut self, phase: Phase, now: Duration) -> (Phase, TickOutcome) {
        match phase {
            Phase::Idle => {
                if let Some(c) = self.compositor.as_mut() {
                    c.draw_idle();
                }
                (Phase::Idle, TickOutcome::Idle)
            }
            Phase::Pending { source, layout } => {
                let started = now;
                let loaded = load_source(&source, layout).and_then(|sheet| {
                    RegistryBuilder::new(Arc::new(sheet), self.cfg.analysis.clone())
                });
                match loaded {
                    Ok(builder) => self.analyze(builder, started, now),
                    Err(e) => self.fail(e),
                }
            }
            Phase::Analyzing { builder, started } => self.analyze(builder, started, now),
            Phase::Ready { sheet, registry } => self.draw_ready(sheet, registry, now),
            Phase::Failed { reason } => {
                if let Some(c) = self.compositor.as_mut() {
                    c.draw_failed();
                }
                (Phase::Failed { reason }, TickOutcome::Failed)
            }
        }
    }

    fn analyze(
        &mut self,
        mut builder: RegistryBuilder,
        started: Duration,
        now: Duration,
    ) -> (Phase, TickOutcome) {
        if let Some(timeout) = self.cfg.analysis.timeout()
            && now.saturating_sub(started) > timeout
        {
            return self.fail(SheetError::timeout(format!(
                "frame analysis exceeded {} ms ({}/{} frames)",
                timeout.as_millis(),
                builder.analysed_frames(),
                builder.total_frames()
            )));
        }

        builder.advance(self.cfg.analysis.frames_per_tick as usize);
        if !builder.is_complete() {
            let outcome = TickOutcome::Analyzing {
                analysed: builder.analysed_frames(),
                total: builder.total_frames(),
            };
            if let Some(c) = self.compositor.as_mut() {
                c.draw_analyzing(now);
            }
            return (Phase::Analyzing { builder, started }, outcome);
        }

        let sheet = builder.sheet().clone();
        let registry = match builder.finish() {
            Ok(r) => Arc::new(r),
            Err(e) => return self.fail(e),
        };
        tracing::info!(
            frames = registry.len(),
            stability = registry.stability_score(),
            "analysis complete; ready"
        );
        self.clock.restart(now, self.params.playing);
        self.draw_ready(sheet, registry, now)
    }

    fn draw_ready(
        &mut self,
        sheet: Arc<SpriteSheet>,
        registry: Arc<FrameRegistry>,
        now: Duration,
    ) -> (Phase, TickOutcome) {
        let Some(compositor) = self.compositor.as_mut() else {
            return self.fail(SheetError::surface("output surface unavailable"));
        };

        let pair = self.clock.frame_pair(now, registry.len());
        match compositor.draw(&sheet, &registry, pair, self.params.smoothing) {
            Ok(report) => {
                self.last_pair = Some(pair);
                self.last_report = Some(report);
                (Phase::Ready { sheet, registry }, TickOutcome::Drawn(pair))
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, err: SheetError) -> (Phase, TickOutcome) {
        tracing::warn!(error = %err, "player failed");
        self.last_pair = None;
        self.last_report = None;
        if let Some(c) = self.compositor.as_mut() {
            c.draw_failed();
        }
        (
            Phase::Failed {
                reason: err.to_string(),
            },
            TickOutcome::Failed,
        )
    }

    /// The last rendered canvas, or `None` when no surface could be created.
    pub fn frame(&self) -> Option<FrameRGBA> {
        self.compositor.as_ref().map(Compositor::frame)
    }

    pub fn last_report(&self) -> Option<&DrawReport> {
        self.last_report.as_ref()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let state = self.state();
        let (total_frames, stability) = match &self.phase {
            Phase::Ready { registry, .. } => (registry.len(), Some(registry.stability_score())),
            Phase::Pending { layout, .. } => (layout.total_frames(), None),
            Phase::Analyzing { builder, .. } => (builder.total_frames(), None),
            Phase::Idle | Phase::Failed { .. } => (0, None),
        };
        Diagnostics {
            active_frame: self
                .last_pair
                .filter(|_| state.is_ready())
                .map(|p| p.current + 1),
            total_frames,
            stability,
            smoothing_active: self.params.smoothing && state.is_ready(),
            speed: self.params.speed,
            playing: self.params.playing,
            state,
        }
    }
}

impl Drop for SpritePlayer {
    fn drop(&mut self) {
        self.cancel_scheduled();
    }
}
