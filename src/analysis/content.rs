use crate::{foundation::core::unpremultiply_px, sheet::source::SpriteSheet};

/// Inclusive bounding box of content-classified samples, in crop-local pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentBounds {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl ContentBounds {
    fn single(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (f64::from(self.min_x) + f64::from(self.max_x)) / 2.0,
            (f64::from(self.min_y) + f64::from(self.max_y)) / 2.0,
        )
    }
}

/// Copy a `size × size` square from the sheet into a tightly packed, straight-alpha scratch
/// buffer, so translucent pixels are classified by their own colour.
///
/// Pixels outside the sheet come back transparent.
pub fn extract_crop(sheet: &SpriteSheet, source_x: u32, source_y: u32, size: u32) -> Vec<u8> {
    let size_us = size as usize;
    let mut out = vec![0u8; size_us * size_us * 4];
    for y in 0..size {
        for x in 0..size {
            let px = unpremultiply_px(sheet.pixel(
                i64::from(source_x) + i64::from(x),
                i64::from(source_y) + i64::from(y),
            ));
            let idx = ((y as usize) * size_us + (x as usize)) * 4;
            out[idx..idx + 4].copy_from_slice(&px);
        }
    }
    out
}

/// True when any colour channel is brighter than `threshold`.
pub fn is_content(px: [u8; 4], threshold: u8) -> bool {
    px[0] > threshold || px[1] > threshold || px[2] > threshold
}

/// Scan a square crop at `stride` in both axes and return the bounding box of content samples.
///
/// Returns `None` for frames with no sample above the threshold.
pub fn scan_content_bounds(
    crop: &[u8],
    size: u32,
    stride: u32,
    threshold: u8,
) -> Option<ContentBounds> {
    let stride = stride.max(1) as usize;
    let size_us = size as usize;
    debug_assert_eq!(crop.len(), size_us * size_us * 4);

    let mut bounds: Option<ContentBounds> = None;
    for y in (0..size_us).step_by(stride) {
        for x in (0..size_us).step_by(stride) {
            let idx = (y * size_us + x) * 4;
            let px = [crop[idx], crop[idx + 1], crop[idx + 2], crop[idx + 3]];
            if !is_content(px, threshold) {
                continue;
            }
            match bounds.as_mut() {
                Some(b) => b.include(x as u32, y as u32),
                None => bounds = Some(ContentBounds::single(x as u32, y as u32)),
            }
        }
    }
    bounds
}
