use std::{path::Path, time::Duration};

use anyhow::Context as _;

use crate::foundation::{
    core::Canvas,
    error::{SheetError, SheetResult},
};

/// Default base loop duration for one forward sweep, in milliseconds.
pub const DEFAULT_BASE_LOOP_MS: u64 = 3000;
/// Matte dark slate used behind every composited frame.
pub const DEFAULT_BACKGROUND_RGBA: [u8; 4] = [15, 23, 42, 255];

/// Pixel-scan heuristics used by the frame registry builder.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Only every `sample_stride`-th pixel is inspected, in both axes.
    pub sample_stride: u32,
    /// A sampled pixel is content when any of R, G, B exceeds this value.
    pub brightness_threshold: u8,
    /// Frames analysed per engine tick; `0` analyses the whole sheet in one tick.
    pub frames_per_tick: u32,
    /// Deadline measured from the tick that starts loading the source; `0` disables it.
    pub timeout_ms: u64,
    /// Analyse cells on the rayon pool for one-shot builds.
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_stride: 4,
            brightness_threshold: 25,
            frames_per_tick: 0,
            timeout_ms: 10_000,
            parallel: false,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> SheetResult<()> {
        if self.sample_stride == 0 {
            return Err(SheetError::validation("analysis sample_stride must be > 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Apply `SHEETPLAY_SAMPLE_STRIDE` / `SHEETPLAY_BRIGHTNESS_THRESHOLD` when set and parseable.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(stride) = std::env::var("SHEETPLAY_SAMPLE_STRIDE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
        {
            self.sample_stride = stride;
        }
        if let Some(threshold) = std::env::var("SHEETPLAY_BRIGHTNESS_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
        {
            self.brightness_threshold = threshold;
        }
        self
    }
}

/// Playback parameters the embedder may change at any time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlaybackParams {
    pub speed: f64,
    pub smoothing: bool,
    pub playing: bool,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            smoothing: true,
            playing: true,
        }
    }
}

impl PlaybackParams {
    pub fn validate(&self) -> SheetResult<()> {
        validate_speed(self.speed)
    }
}

pub fn validate_speed(speed: f64) -> SheetResult<()> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(SheetError::validation(format!(
            "playback speed must be a positive finite number, got {speed}"
        )));
    }
    Ok(())
}

/// Duration of one forward-and-back cycle, `2 * base_loop / speed`.
///
/// Fails instead of overflowing when the speed is so small the cycle no longer fits a
/// [`Duration`].
pub fn loop_cycle(base_loop: Duration, speed: f64) -> SheetResult<Duration> {
    validate_speed(speed)?;
    Duration::try_from_secs_f64(base_loop.as_secs_f64() / speed)
        .ok()
        .and_then(|sweep| sweep.checked_mul(2))
        .ok_or_else(|| {
            SheetError::validation(format!(
                "playback speed {speed} is too slow for a {} ms loop",
                base_loop.as_millis()
            ))
        })
}

/// Engine-wide configuration. Every field has a default so partial JSON files are accepted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub canvas: Canvas,
    /// Straight-alpha RGBA8 clear color.
    pub background_rgba: [u8; 4],
    /// Fraction of the canvas's shorter side the square crop is scaled to.
    pub fit_fraction: f64,
    pub base_loop_ms: u64,
    pub analysis: AnalysisConfig,
    pub playback: PlaybackParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            background_rgba: DEFAULT_BACKGROUND_RGBA,
            fit_fraction: 0.9,
            base_loop_ms: DEFAULT_BASE_LOOP_MS,
            analysis: AnalysisConfig::default(),
            playback: PlaybackParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> SheetResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(SheetError::validation("canvas width/height must be non-zero"));
        }
        if !self.fit_fraction.is_finite() || self.fit_fraction <= 0.0 || self.fit_fraction > 1.0 {
            return Err(SheetError::validation("fit_fraction must be in (0, 1]"));
        }
        if self.base_loop_ms == 0 {
            return Err(SheetError::validation("base_loop_ms must be > 0"));
        }
        self.analysis.validate()?;
        self.playback.validate()?;
        loop_cycle(self.base_loop(), self.playback.speed).map(|_| ())
    }

    pub fn base_loop(&self) -> Duration {
        Duration::from_millis(self.base_loop_ms)
    }

    pub fn from_json_str(s: &str) -> SheetResult<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| SheetError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> SheetResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read engine config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }
}
