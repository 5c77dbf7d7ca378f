//! sheetplay stabilizes and plays back AI-generated exercise sprite sheets.
//!
//! A sprite sheet is a single image holding a 4×4 or 5×5 grid of animation frames. Generated
//! sheets jitter: the subject drifts a few pixels from cell to cell. sheetplay removes that
//! drift and renders a smooth, seamless loop.
//!
//! # Pipeline overview
//!
//! 1. **Load**: `SourceRef + GridLayout -> SpriteSheet` (decoded, premultiplied RGBA8)
//! 2. **Analyse**: `SpriteSheet -> FrameRegistry` (per-frame square crop plus the offset that
//!    centres the detected subject, "Smart-Crop")
//! 3. **Schedule**: `time -> FramePair` (ping-pong curve, current/next frame, blend factor)
//! 4. **Composite**: `FramePair -> FrameRGBA` (scale-to-fit, stabilized, cross-dissolved)
//! 5. **Export** (optional): one full loop to PNG frames or to MP4 via the system `ffmpeg`
//!
//! [`SpritePlayer`] ties the steps together behind an `Idle -> Analyzing -> Ready` state
//! machine (plus `Failed`), driven by host ticks or by a fixed-rate [`TickDriver`].
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Host-supplied time**: the engine never reads the clock itself, so playback is
//!   deterministic for a given tick sequence.
//! - **Failures are states**: load, decode, timeout and surface failures surface as
//!   [`EngineState::Failed`], never as panics.
#![forbid(unsafe_code)]

mod analysis;
mod encode;
mod engine;
mod foundation;
mod playback;
mod render;
mod sheet;

pub use analysis::content::{ContentBounds, extract_crop, is_content, scan_content_bounds};
pub use analysis::registry::{
    FrameDescriptor, FrameRegistry, RegistryBuilder, analyze_frame, build_registry,
};
pub use encode::ffmpeg::{EncodeConfig, FfmpegEncoder, ensure_parent_dir, is_ffmpeg_on_path};
pub use encode::png::write_png;
pub use encode::loop_export::{LoopExportOpts, LoopFrames, render_loop};
pub use engine::lifecycle::{Diagnostics, EngineState, TickOutcome};
pub use engine::player::SpritePlayer;
pub use foundation::config::{
    AnalysisConfig, DEFAULT_BACKGROUND_RGBA, DEFAULT_BASE_LOOP_MS, EngineConfig, PlaybackParams,
    loop_cycle, validate_speed,
};
pub use foundation::core::{Affine, Canvas, Point, Rgba8Premul, Vec2};
pub use foundation::error::{SheetError, SheetResult};
pub use playback::clock::{FramePair, PlaybackClock, ping_pong_progress};
pub use playback::driver::{CancelToken, TickDriver, TickStats};
pub use render::composite::{Blit, blit_scaled, fill_rect, over};
pub use render::compositor::{Compositor, DrawReport, DrawnLayer, FitTransform};
pub use render::surface::{FrameRGBA, MAX_SURFACE_SIDE, Surface};
pub use sheet::layout::GridLayout;
pub use sheet::source::{
    SourceRef, SpriteSheet, decode_sprite_sheet, load_source, read_sprite_sheet,
};
