use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    analysis::registry::FrameRegistry,
    encode::{
        ffmpeg::{EncodeConfig, FfmpegEncoder},
        png::write_png,
    },
    foundation::{
        config::{EngineConfig, validate_speed},
        error::{SheetError, SheetResult},
    },
    playback::clock::{FramePair, PlaybackClock},
    render::{compositor::Compositor, surface::FrameRGBA},
    sheet::source::SpriteSheet,
};

/// Options for rendering one seamless ping-pong cycle.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoopExportOpts {
    pub fps: u32,
    pub speed: f64,
    pub smoothing: bool,
    /// Whether an existing MP4 at the output path may be replaced.
    pub overwrite: bool,
}

impl Default for LoopExportOpts {
    fn default() -> Self {
        Self {
            fps: 30,
            speed: 1.0,
            smoothing: true,
            overwrite: true,
        }
    }
}

impl LoopExportOpts {
    pub fn validate(&self) -> SheetResult<()> {
        if self.fps == 0 {
            return Err(SheetError::validation("export fps must be non-zero"));
        }
        validate_speed(self.speed)
    }
}

/// Frames of one forward-and-back cycle, rendered lazily at a fixed frame rate.
///
/// The cycle's last frame is the one just before the loop wraps, so playing the sequence on
/// repeat has no duplicated or skipped frame at the seam.
pub struct LoopFrames<'a> {
    sheet: &'a SpriteSheet,
    registry: &'a FrameRegistry,
    compositor: Compositor,
    clock: PlaybackClock,
    fps: u32,
    smoothing: bool,
    next: u64,
    total: u64,
}

impl LoopFrames<'_> {
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        let c = self.compositor.canvas();
        (c.width, c.height)
    }

    pub fn total_frames(&self) -> u64 {
        self.total
    }

    /// Loop time of output frame `index`.
    pub fn time_of(&self, index: u64) -> Duration {
        Duration::from_secs(index) / self.fps
    }

    /// The frame pair scheduled for output frame `index`.
    pub fn pair_of(&self, index: u64) -> FramePair {
        self.clock.frame_pair(self.time_of(index), self.registry.len())
    }

    /// Encode every remaining frame to an MP4 at `out_path`. Returns the frame count.
    #[tracing::instrument(skip_all, fields(out = %out_path.display()))]
    pub fn write_mp4(self, out_path: &Path, overwrite: bool, bg_rgba: [u8; 4]) -> SheetResult<u64> {
        let (width, height) = self.canvas_size();
        let mut enc = FfmpegEncoder::new(
            EncodeConfig {
                width,
                height,
                fps: self.fps,
                out_path: out_path.to_path_buf(),
                overwrite,
            },
            bg_rgba,
        )?;
        for frame in self {
            enc.encode_frame(&frame?)?;
        }
        enc.finish()
    }

    /// Write every remaining frame as `frame_00000.png`, `frame_00001.png`, ... under `dir`.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn write_png_sequence(self, dir: &Path) -> SheetResult<Vec<PathBuf>> {
        let start = self.next;
        let mut written = Vec::with_capacity((self.total - start) as usize);
        for (i, frame) in (start..).zip(self) {
            let path = dir.join(format!("frame_{i:05}.png"));
            write_png(&frame?, &path)?;
            written.push(path);
        }
        tracing::info!(frames = written.len(), "png sequence written");
        Ok(written)
    }
}

impl Iterator for LoopFrames<'_> {
    type Item = SheetResult<FrameRGBA>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let pair = self.pair_of(self.next);
        self.next += 1;
        Some(
            self.compositor
                .draw(self.sheet, self.registry, pair, self.smoothing)
                .map(|_| self.compositor.frame()),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.total - self.next) as usize;
        (n, Some(n))
    }
}

/// Prepare a full ping-pong cycle of `sheet` for export.
///
/// The cycle lasts `2 * base_loop / speed`; the frame count is that duration times `fps`,
/// rounded up.
pub fn render_loop<'a>(
    sheet: &'a SpriteSheet,
    registry: &'a FrameRegistry,
    cfg: &EngineConfig,
    opts: &LoopExportOpts,
) -> SheetResult<LoopFrames<'a>> {
    cfg.validate()?;
    opts.validate()?;
    if registry.layout() != sheet.layout {
        return Err(SheetError::validation(format!(
            "registry layout {} does not match sheet layout {}",
            registry.layout(),
            sheet.layout
        )));
    }
    if registry.crop_size() != sheet.crop_size() {
        return Err(SheetError::validation(format!(
            "registry crop size {} does not match sheet crop size {}",
            registry.crop_size(),
            sheet.crop_size()
        )));
    }

    let mut clock = PlaybackClock::new(cfg.base_loop(), opts.speed)?;
    clock.restart(Duration::ZERO, true);

    let cycle_nanos = 2 * clock.playback_duration().as_nanos();
    let total = (cycle_nanos * u128::from(opts.fps)).div_ceil(1_000_000_000);
    let total = u64::try_from(total)
        .map_err(|_| SheetError::validation("loop export frame count overflows u64"))?;

    tracing::debug!(total, fps = opts.fps, speed = opts.speed, "loop export prepared");
    Ok(LoopFrames {
        sheet,
        registry,
        compositor: Compositor::new(cfg)?,
        clock,
        fps: opts.fps,
        smoothing: opts.smoothing,
        next: 0,
        total,
    })
}
