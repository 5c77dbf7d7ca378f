use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    analysis::content::{ContentBounds, extract_crop, scan_content_bounds},
    foundation::{
        config::AnalysisConfig,
        core::Vec2,
        error::{SheetError, SheetResult},
    },
    sheet::{layout::GridLayout, source::SpriteSheet},
};

/// Stabilized crop for one frame of the sheet.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameDescriptor {
    pub index: usize,
    /// Top-left of the naive square cutout, in sheet pixels.
    pub source_x: u32,
    pub source_y: u32,
    pub crop_size: u32,
    /// Translation (crop-local pixels) that moves the content centre onto the crop centre.
    pub offset_x: f64,
    pub offset_y: f64,
    /// Sampled content box, `None` for empty frames.
    pub content: Option<ContentBounds>,
}

impl FrameDescriptor {
    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.offset_x, self.offset_y)
    }

    pub fn correction(&self) -> f64 {
        self.offset_x.abs() + self.offset_y.abs()
    }
}

/// Ordered, immutable set of frame descriptors for one sprite sheet.
///
/// Only [`RegistryBuilder`] and [`build_registry`] create registries, and only once every
/// frame has been analysed.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FrameRegistry {
    layout: GridLayout,
    crop_size: u32,
    frames: Vec<FrameDescriptor>,
}

impl FrameRegistry {
    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    pub fn crop_size(&self) -> u32 {
        self.crop_size
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameDescriptor> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }

    /// `100 - mean(|offset_x| + |offset_y|)`, clamped to `[0, 100]`.
    ///
    /// Lower scores mean the source needed more correction.
    pub fn stability_score(&self) -> f64 {
        if self.frames.is_empty() {
            return 100.0;
        }
        let total: f64 = self.frames.iter().map(FrameDescriptor::correction).sum();
        (100.0 - total / self.frames.len() as f64).clamp(0.0, 100.0)
    }
}

/// Analyse frame `index` of `sheet`.
pub fn analyze_frame(sheet: &SpriteSheet, index: usize, cfg: &AnalysisConfig) -> FrameDescriptor {
    let cols = sheet.layout.cols() as usize;
    let (cell_w, cell_h) = sheet.cell_size();
    let crop_size = sheet.crop_size();

    let cell_x = (index % cols) as f64 * cell_w;
    let cell_y = (index / cols) as f64 * cell_h;
    let crop_offset_x = (cell_w - f64::from(crop_size)) / 2.0;
    let crop_offset_y = (cell_h - f64::from(crop_size)) / 2.0;
    let source_x = (cell_x + crop_offset_x).floor() as u32;
    let source_y = (cell_y + crop_offset_y).floor() as u32;

    let crop = extract_crop(sheet, source_x, source_y, crop_size);
    let content = scan_content_bounds(
        &crop,
        crop_size,
        cfg.sample_stride,
        cfg.brightness_threshold,
    );

    let (offset_x, offset_y) = match content {
        Some(bounds) => {
            let (cx, cy) = bounds.center();
            let half = f64::from(crop_size) / 2.0;
            (half - cx, half - cy)
        }
        None => (0.0, 0.0),
    };

    tracing::debug!(index, source_x, source_y, offset_x, offset_y, "frame analysed");

    FrameDescriptor {
        index,
        source_x,
        source_y,
        crop_size,
        offset_x,
        offset_y,
        content,
    }
}

/// Build the whole registry in one call.
#[tracing::instrument(skip(sheet, cfg), fields(layout = %sheet.layout, parallel = cfg.parallel))]
pub fn build_registry(sheet: &SpriteSheet, cfg: &AnalysisConfig) -> SheetResult<FrameRegistry> {
    cfg.validate()?;
    let total = sheet.layout.total_frames();
    let frames: Vec<FrameDescriptor> = if cfg.parallel {
        (0..total)
            .into_par_iter()
            .map(|i| analyze_frame(sheet, i, cfg))
            .collect()
    } else {
        (0..total).map(|i| analyze_frame(sheet, i, cfg)).collect()
    };
    Ok(FrameRegistry {
        layout: sheet.layout,
        crop_size: sheet.crop_size(),
        frames,
    })
}

/// Incremental builder so analysis can be spread across engine ticks.
#[derive(Debug)]
pub struct RegistryBuilder {
    sheet: Arc<SpriteSheet>,
    cfg: AnalysisConfig,
    frames: Vec<FrameDescriptor>,
}

impl RegistryBuilder {
    pub fn new(sheet: Arc<SpriteSheet>, cfg: AnalysisConfig) -> SheetResult<Self> {
        cfg.validate()?;
        let total = sheet.layout.total_frames();
        Ok(Self {
            sheet,
            cfg,
            frames: Vec::with_capacity(total),
        })
    }

    pub fn sheet(&self) -> &Arc<SpriteSheet> {
        &self.sheet
    }

    pub fn total_frames(&self) -> usize {
        self.sheet.layout.total_frames()
    }

    pub fn analysed_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_complete(&self) -> bool {
        self.frames.len() == self.total_frames()
    }

    /// Analyse up to `max_frames` more frames (`0` means all remaining). Returns how many ran.
    pub fn advance(&mut self, max_frames: usize) -> usize {
        let remaining = self.total_frames() - self.frames.len();
        let n = if max_frames == 0 {
            remaining
        } else {
            max_frames.min(remaining)
        };
        let start = self.frames.len();
        for i in start..start + n {
            let d = analyze_frame(&self.sheet, i, &self.cfg);
            self.frames.push(d);
        }
        n
    }

    pub fn finish(self) -> SheetResult<FrameRegistry> {
        if !self.is_complete() {
            return Err(SheetError::validation(format!(
                "registry incomplete: {}/{} frames analysed",
                self.frames.len(),
                self.total_frames()
            )));
        }
        Ok(FrameRegistry {
            layout: self.sheet.layout,
            crop_size: self.sheet.crop_size(),
            frames: self.frames,
        })
    }
}
