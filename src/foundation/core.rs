use crate::foundation::error::{SheetError, SheetResult};

pub use kurbo::{Affine, Point, Vec2};

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> SheetResult<Self> {
        if width == 0 || height == 0 {
            return Err(SheetError::validation("canvas width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }

    pub fn shorter_side(self) -> u32 {
        self.width.min(self.height)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8Premul {
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        let [r, g, b, a] = premultiply_px([r, g, b, a]);
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// `round(x * y / 255)`.
pub(crate) fn mul_div255(x: u16, y: u16) -> u16 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u16
}

pub(crate) fn premultiply_px(px: [u8; 4]) -> [u8; 4] {
    let a = u16::from(px[3]);
    let [r, g, b] = [px[0], px[1], px[2]].map(|c| mul_div255(u16::from(c), a) as u8);
    [r, g, b, px[3]]
}

/// Inverse of [`premultiply_px`]; fully transparent pixels come back as transparent black.
pub(crate) fn unpremultiply_px(px: [u8; 4]) -> [u8; 4] {
    let a = u16::from(px[3]);
    match a {
        0 => [0, 0, 0, 0],
        255 => px,
        _ => {
            let [r, g, b] =
                [px[0], px[1], px[2]].map(|c| ((u16::from(c) * 255 + a / 2) / a).min(255) as u8);
            [r, g, b, px[3]]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_rejects_zero_dimensions() {
        assert!(Canvas::new(0, 10).is_err());
        assert!(Canvas::new(10, 0).is_err());
        assert_eq!(Canvas::new(640, 360).unwrap().shorter_side(), 360);
    }

    #[test]
    fn premul_scales_color_by_alpha() {
        assert_eq!(
            Rgba8Premul::from_straight_rgba(255, 255, 255, 255).to_array(),
            [255, 255, 255, 255]
        );
        assert_eq!(
            Rgba8Premul::from_straight_rgba(200, 100, 0, 0),
            Rgba8Premul::transparent()
        );
        assert_eq!(Rgba8Premul::from_straight_rgba(200, 100, 0, 128).r, 100);
    }

    #[test]
    fn unpremultiply_recovers_straight_channels() {
        assert_eq!(unpremultiply_px(premultiply_px([200, 200, 200, 30])), [204, 204, 204, 30]);
        assert_eq!(unpremultiply_px([64, 32, 0, 128]), [128, 64, 0, 128]);
        assert_eq!(unpremultiply_px([9, 9, 9, 0]), [0, 0, 0, 0]);
        assert_eq!(unpremultiply_px([1, 2, 3, 255]), [1, 2, 3, 255]);
    }
}
