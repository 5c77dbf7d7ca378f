use crate::foundation::{
    core::{Canvas, unpremultiply_px},
    error::{SheetError, SheetResult},
};

/// Largest side length a surface may have.
pub const MAX_SURFACE_SIDE: u32 = 16_384;

/// A rendered frame handed to the embedder.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Straight-alpha copy suitable for PNG encoding.
    pub fn to_rgba_image(&self) -> SheetResult<image::RgbaImage> {
        let mut data = self.data.clone();
        if self.premultiplied {
            for px in data.chunks_exact_mut(4) {
                let straight = unpremultiply_px([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&straight);
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| SheetError::surface("frame buffer does not match width*height*4"))
    }
}

/// Owned offscreen raster: premultiplied RGBA8, row-major, tightly packed.
#[derive(Clone, Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Allocate a surface. Fails instead of panicking when the host cannot provide one.
    pub fn new(canvas: Canvas) -> SheetResult<Self> {
        let Canvas { width, height } = canvas;
        if width == 0 || height == 0 {
            return Err(SheetError::surface("surface width/height must be non-zero"));
        }
        if width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
            return Err(SheetError::surface(format!(
                "surface {width}x{height} exceeds {MAX_SURFACE_SIDE}px limit"
            )));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| SheetError::surface("surface buffer size overflow"))?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| SheetError::surface(format!("allocate {len} byte surface: {e}")))?;
        data.resize(len, 0);

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self, premul: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.index(x, y);
        let px = &self.data[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let idx = self.index(x, y);
        &mut self.data[idx..idx + 4]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }

    pub fn to_frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
            premultiplied: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_sizes_fail_without_panicking() {
        assert!(matches!(
            Surface::new(Canvas {
                width: 0,
                height: 10
            }),
            Err(SheetError::Surface(_))
        ));
        assert!(matches!(
            Surface::new(Canvas {
                width: MAX_SURFACE_SIDE + 1,
                height: 10
            }),
            Err(SheetError::Surface(_))
        ));
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut s = Surface::new(Canvas {
            width: 3,
            height: 2,
        })
        .unwrap();
        s.clear([1, 2, 3, 255]);
        assert!(s.data().chunks_exact(4).all(|p| p == [1, 2, 3, 255]));
        assert_eq!(s.pixel(2, 1), Some([1, 2, 3, 255]));
        assert_eq!(s.pixel(3, 0), None);
    }

    #[test]
    fn frame_unpremultiplies_for_png() {
        let frame = FrameRGBA {
            width: 2,
            height: 1,
            data: vec![64, 32, 0, 128, 10, 20, 30, 255],
            premultiplied: true,
        };
        let img = frame.to_rgba_image().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [128, 64, 0, 128]);
        assert_eq!(img.get_pixel(1, 0).0, [10, 20, 30, 255]);
    }
}
