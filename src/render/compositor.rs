use std::time::Duration;

use crate::{
    analysis::registry::FrameRegistry,
    foundation::{
        config::EngineConfig,
        core::{Affine, Canvas, Point, Rgba8Premul, Vec2},
        error::{SheetError, SheetResult},
    },
    playback::clock::{FramePair, ping_pong_progress},
    render::{
        composite::{Blit, blit_scaled, fill_rect},
        surface::{FrameRGBA, Surface},
    },
    sheet::source::SpriteSheet,
};

/// Sweep time of the indeterminate progress bar shown while analysing.
const INDICATOR_SWEEP: Duration = Duration::from_millis(900);

/// Uniform scale-to-fit placement of the square crop on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct FitTransform {
    pub scale: f64,
    pub base_x: f64,
    pub base_y: f64,
    /// Side of the scaled crop in canvas pixels.
    pub size: f64,
}

impl FitTransform {
    pub fn new(canvas: Canvas, crop_size: u32, fit_fraction: f64) -> Self {
        let target = f64::from(canvas.shorter_side()) * fit_fraction;
        let scale = if crop_size == 0 {
            0.0
        } else {
            target / f64::from(crop_size)
        };
        let size = f64::from(crop_size) * scale;
        Self {
            scale,
            base_x: (f64::from(canvas.width) - size) / 2.0,
            base_y: (f64::from(canvas.height) - size) / 2.0,
            size,
        }
    }

    /// Crop-local to canvas transform for a frame stabilized by `offset` (crop pixels).
    pub fn layer_transform(&self, offset: Vec2) -> Affine {
        Affine::translate(Vec2::new(self.base_x, self.base_y) + offset * self.scale)
            * Affine::scale(self.scale)
    }
}

/// One frame drawn during a tick.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct DrawnLayer {
    pub frame: usize,
    pub alpha: f64,
    pub x: f64,
    pub y: f64,
}

/// What a single [`Compositor::draw`] call put on the canvas, bottom layer first.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct DrawReport {
    pub layers: Vec<DrawnLayer>,
}

/// Owns the output surface and draws blended, stabilized frames onto it.
#[derive(Debug)]
pub struct Compositor {
    surface: Surface,
    background: [u8; 4],
    fit_fraction: f64,
}

impl Compositor {
    pub fn new(cfg: &EngineConfig) -> SheetResult<Self> {
        let [r, g, b, a] = cfg.background_rgba;
        Ok(Self {
            surface: Surface::new(cfg.canvas)?,
            background: Rgba8Premul::from_straight_rgba(r, g, b, a).to_array(),
            fit_fraction: cfg.fit_fraction,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.surface.canvas()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn frame(&self) -> FrameRGBA {
        self.surface.to_frame()
    }

    pub fn fit(&self, crop_size: u32) -> FitTransform {
        FitTransform::new(self.surface.canvas(), crop_size, self.fit_fraction)
    }

    /// Draw `pair` from `registry`. With smoothing off only the current frame is drawn.
    pub fn draw(
        &mut self,
        sheet: &SpriteSheet,
        registry: &FrameRegistry,
        pair: FramePair,
        smoothing: bool,
    ) -> SheetResult<DrawReport> {
        self.surface.clear(self.background);

        let fit = self.fit(registry.crop_size());
        let mut report = DrawReport::default();

        self.draw_layer(sheet, registry, &fit, pair.current, 1.0, &mut report)?;
        if smoothing && pair.blend > 0.0 {
            self.draw_layer(sheet, registry, &fit, pair.next, pair.blend, &mut report)?;
        }
        Ok(report)
    }

    fn draw_layer(
        &mut self,
        sheet: &SpriteSheet,
        registry: &FrameRegistry,
        fit: &FitTransform,
        index: usize,
        alpha: f64,
        report: &mut DrawReport,
    ) -> SheetResult<()> {
        let d = registry.get(index).ok_or_else(|| {
            SheetError::validation(format!(
                "frame {index} out of range for {} frame registry",
                registry.len()
            ))
        })?;
        let origin = fit.layer_transform(d.offset()) * Point::ORIGIN;
        let (x, y) = (origin.x, origin.y);
        blit_scaled(
            &mut self.surface,
            sheet,
            Blit {
                src_x: d.source_x,
                src_y: d.source_y,
                src_size: d.crop_size,
                dst_x: x,
                dst_y: y,
                dst_size: fit.size,
                opacity: alpha as f32,
            },
        );
        report.layers.push(DrawnLayer {
            frame: index,
            alpha,
            x,
            y,
        });
        Ok(())
    }

    pub fn draw_idle(&mut self) {
        self.surface.clear(self.background);
    }

    /// Indeterminate progress bar; its head bounces along the track with `now`.
    pub fn draw_analyzing(&mut self, now: Duration) {
        self.surface.clear(self.background);
        let Canvas { width, height } = self.surface.canvas();
        let (w, h) = (f64::from(width), f64::from(height));

        let track_w = w * 0.6;
        let track_h = (h / 64.0).max(2.0);
        let track_x = (w - track_w) / 2.0;
        let track_y = (h - track_h) / 2.0;
        fill_rect(
            &mut self.surface,
            track_x,
            track_y,
            track_w,
            track_h,
            [51, 65, 85, 255],
            1.0,
        );

        let head_w = track_w * 0.3;
        let t = ping_pong_progress(now, INDICATOR_SWEEP);
        fill_rect(
            &mut self.surface,
            track_x + (track_w - head_w) * t,
            track_y,
            head_w,
            track_h,
            [56, 189, 248, 255],
            1.0,
        );
    }

    /// Static fallback glyph shown when the engine has failed.
    pub fn draw_failed(&mut self) {
        self.surface.clear(self.background);
        let Canvas { width, height } = self.surface.canvas();
        let side = f64::from(width.min(height)) * 0.25;
        let thickness = (side / 8.0).max(1.0);
        let cx = f64::from(width) / 2.0;
        let cy = f64::from(height) / 2.0;
        let color = [200, 60, 60, 255];

        // Two diagonals built from small squares along each stroke.
        let steps = (side / (thickness / 2.0)).ceil().max(1.0) as u32;
        for i in 0..=steps {
            let t = f64::from(i) / f64::from(steps) - 0.5;
            let dx = t * side;
            for dy in [t * side, -t * side] {
                fill_rect(
                    &mut self.surface,
                    cx + dx - thickness / 2.0,
                    cy + dy - thickness / 2.0,
                    thickness,
                    thickness,
                    color,
                    1.0,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::registry::build_registry, foundation::config::AnalysisConfig,
        sheet::layout::GridLayout,
    };

    fn cfg(w: u32, h: u32) -> EngineConfig {
        EngineConfig {
            canvas: Canvas {
                width: w,
                height: h,
            },
            ..EngineConfig::default()
        }
    }

    fn sheet_with_distinct_frames() -> SpriteSheet {
        // 4x4 grid of 16px cells, cell i filled with grey level 10*i + 40.
        let (w, h) = (64u32, 64u32);
        let mut rgba = vec![0u8; (w * h * 4) as usize];
        for y in 0..h {
            for x in 0..w {
                let i = (y / 16) * 4 + x / 16;
                let v = (10 * i + 40) as u8;
                let idx = ((y * w + x) * 4) as usize;
                rgba[idx..idx + 4].copy_from_slice(&[v, v, v, 255]);
            }
        }
        SpriteSheet::from_rgba8(w, h, rgba, GridLayout::Grid4x4).unwrap()
    }

    #[test]
    fn fit_uses_ninety_percent_of_shorter_side() {
        let fit = FitTransform::new(
            Canvas {
                width: 400,
                height: 200,
            },
            50,
            0.9,
        );
        assert!((fit.scale - 3.6).abs() < 1e-12);
        assert!((fit.size - 180.0).abs() < 1e-9);
        assert!((fit.base_x - 110.0).abs() < 1e-9);
        assert!((fit.base_y - 10.0).abs() < 1e-9);

        let t = fit.layer_transform(Vec2::new(2.0, -1.0));
        let origin = t * Point::ORIGIN;
        assert!((origin.x - 117.2).abs() < 1e-9);
        assert!((origin.y - 6.4).abs() < 1e-9);
        let corner = t * Point::new(50.0, 50.0);
        assert!((corner.x - origin.x - 180.0).abs() < 1e-9);
    }

    #[test]
    fn smoothing_off_draws_one_opaque_layer() {
        let sheet = sheet_with_distinct_frames();
        let reg = build_registry(&sheet, &AnalysisConfig::default()).unwrap();
        let mut c = Compositor::new(&cfg(64, 64)).unwrap();

        for blend in [0.0, 0.25, 0.5, 0.99] {
            let pair = FramePair {
                current: 3,
                next: 4,
                blend,
            };
            let report = c.draw(&sheet, &reg, pair, false).unwrap();
            assert_eq!(report.layers.len(), 1);
            assert_eq!(report.layers[0].frame, 3);
            assert_eq!(report.layers[0].alpha, 1.0);
        }
    }

    #[test]
    fn smoothing_on_cross_dissolves_next_frame() {
        let sheet = sheet_with_distinct_frames();
        let reg = build_registry(&sheet, &AnalysisConfig::default()).unwrap();
        let mut c = Compositor::new(&cfg(64, 64)).unwrap();

        let pair = FramePair {
            current: 0,
            next: 1,
            blend: 0.5,
        };
        let report = c.draw(&sheet, &reg, pair, true).unwrap();
        assert_eq!(report.layers.len(), 2);
        assert_eq!((report.layers[1].frame, report.layers[1].alpha), (1, 0.5));

        // frames 0 and 1 are grey 40 and 50 -> centre pixel near 45
        let centre = c.surface().pixel(32, 32).unwrap();
        assert!((44..=46).contains(&centre[0]), "centre {centre:?}");

        let still = FramePair {
            current: 2,
            next: 2,
            blend: 0.0,
        };
        assert_eq!(c.draw(&sheet, &reg, still, true).unwrap().layers.len(), 1);
    }

    #[test]
    fn background_shows_around_the_fitted_crop() {
        let sheet = sheet_with_distinct_frames();
        let reg = build_registry(&sheet, &AnalysisConfig::default()).unwrap();
        let mut c = Compositor::new(&cfg(100, 100)).unwrap();
        c.draw(
            &sheet,
            &reg,
            FramePair {
                current: 0,
                next: 0,
                blend: 0.0,
            },
            true,
        )
        .unwrap();
        assert_eq!(c.surface().pixel(0, 0).unwrap(), [15, 23, 42, 255]);
        assert_eq!(c.surface().pixel(50, 50).unwrap(), [40, 40, 40, 255]);
    }

    #[test]
    fn out_of_range_frame_is_an_error() {
        let sheet = sheet_with_distinct_frames();
        let reg = build_registry(&sheet, &AnalysisConfig::default()).unwrap();
        let mut c = Compositor::new(&cfg(32, 32)).unwrap();
        let pair = FramePair {
            current: 16,
            next: 16,
            blend: 0.0,
        };
        assert!(c.draw(&sheet, &reg, pair, true).is_err());
    }

    #[test]
    fn placeholders_paint_something_besides_background() {
        let mut c = Compositor::new(&cfg(64, 64)).unwrap();
        let bg = [15, 23, 42, 255];

        c.draw_analyzing(Duration::from_millis(100));
        assert!(c.surface().data().chunks_exact(4).any(|p| p != bg));

        c.draw_failed();
        assert_eq!(c.surface().pixel(32, 32).unwrap(), [200, 60, 60, 255]);

        c.draw_idle();
        assert!(c.surface().data().chunks_exact(4).all(|p| p == bg));
    }
}
