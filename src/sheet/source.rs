use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;

use crate::{
    foundation::{
        core::premultiply_px,
        error::{SheetError, SheetResult},
    },
    sheet::layout::GridLayout,
};

/// Where a sprite sheet comes from. The engine only ever sees already-fetched resources.
#[derive(Clone)]
pub enum SourceRef {
    /// Encoded image file on disk.
    Path(PathBuf),
    /// Encoded image bytes held in memory (PNG, JPEG, WebP, ...).
    Bytes(Arc<[u8]>),
    /// An already decoded sheet.
    Decoded(SpriteSheet),
}

impl SourceRef {
    pub fn path(p: impl Into<PathBuf>) -> Self {
        Self::Path(p.into())
    }

    pub fn bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Decoded(s) => write!(f, "Decoded({}x{} {})", s.width, s.height, s.layout),
        }
    }
}

/// A decoded sprite sheet with its declared grid layout. Immutable once built.
#[derive(Clone, Debug)]
pub struct SpriteSheet {
    pub width: u32,
    pub height: u32,
    pub layout: GridLayout,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl SpriteSheet {
    /// Build a sheet from straight-alpha RGBA8 pixels.
    pub fn from_rgba8(
        width: u32,
        height: u32,
        mut rgba: Vec<u8>,
        layout: GridLayout,
    ) -> SheetResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| SheetError::source_load("sprite sheet size overflow"))?;
        if rgba.len() != expected {
            return Err(SheetError::source_load(format!(
                "expected {expected} bytes of rgba8 for {width}x{height}, got {}",
                rgba.len()
            )));
        }
        premultiply_rgba8_in_place(&mut rgba);
        let sheet = Self {
            width,
            height,
            layout,
            rgba8_premul: Arc::new(rgba),
        };
        if sheet.crop_size() == 0 {
            return Err(SheetError::source_load(format!(
                "sprite sheet {width}x{height} is too small for {layout}"
            )));
        }
        Ok(sheet)
    }

    pub fn from_image(img: image::RgbaImage, layout: GridLayout) -> SheetResult<Self> {
        let (width, height) = img.dimensions();
        Self::from_rgba8(width, height, img.into_raw(), layout)
    }

    /// Cell width and height; fractional when the sheet does not divide evenly.
    pub fn cell_size(&self) -> (f64, f64) {
        (
            f64::from(self.width) / f64::from(self.layout.cols()),
            f64::from(self.height) / f64::from(self.layout.rows()),
        )
    }

    /// Side of the square cutout that fits inside every cell.
    pub fn crop_size(&self) -> u32 {
        let (cw, ch) = self.cell_size();
        cw.min(ch).floor() as u32
    }

    /// Premultiplied pixel at `(x, y)`; transparent outside the sheet.
    pub fn pixel(&self, x: i64, y: i64) -> [u8; 4] {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return [0, 0, 0, 0];
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = &self.rgba8_premul[idx..idx + 4];
        [px[0], px[1], px[2], px[3]]
    }
}

/// Decode encoded image bytes into a sprite sheet.
pub fn decode_sprite_sheet(bytes: &[u8], layout: GridLayout) -> SheetResult<SpriteSheet> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| SheetError::source_load(format!("decode image from memory: {e}")))?;
    SpriteSheet::from_image(dyn_img.to_rgba8(), layout)
}

/// Read and decode a sprite sheet from disk.
pub fn read_sprite_sheet(path: &Path, layout: GridLayout) -> SheetResult<SpriteSheet> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read sprite sheet '{}'", path.display()))
        .map_err(|e| SheetError::source_load(format!("{e:#}")))?;
    decode_sprite_sheet(&bytes, layout)
}

/// Resolve any [`SourceRef`] into a decoded sheet.
#[tracing::instrument(skip(source), fields(source = ?source))]
pub fn load_source(source: &SourceRef, layout: GridLayout) -> SheetResult<SpriteSheet> {
    let sheet = match source {
        SourceRef::Path(p) => read_sprite_sheet(p, layout)?,
        SourceRef::Bytes(b) => decode_sprite_sheet(b, layout)?,
        SourceRef::Decoded(s) => {
            if s.layout != layout {
                return Err(SheetError::validation(format!(
                    "decoded sheet declares {} but {} was requested",
                    s.layout, layout
                )));
            }
            s.clone()
        }
    };
    tracing::debug!(
        width = sheet.width,
        height = sheet.height,
        crop = sheet.crop_size(),
        "sprite sheet loaded"
    );
    Ok(sheet)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let premul = premultiply_px([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&premul);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(img: image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_png_dimensions_and_premul() {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([100, 50, 200, 128]));
        let sheet = decode_sprite_sheet(&png_bytes(img), GridLayout::Grid4x4).unwrap();
        assert_eq!((sheet.width, sheet.height), (8, 8));
        assert_eq!(
            sheet.pixel(0, 0),
            [
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
        assert_eq!(sheet.pixel(-1, 0), [0, 0, 0, 0]);
        assert_eq!(sheet.pixel(8, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn garbage_bytes_are_a_source_load_error() {
        let err = decode_sprite_sheet(b"definitely not an image", GridLayout::Grid4x4).unwrap_err();
        assert!(matches!(err, SheetError::SourceLoad(_)));
    }

    #[test]
    fn missing_file_is_a_source_load_error() {
        let err = load_source(
            &SourceRef::path("/nonexistent/sheet.png"),
            GridLayout::Grid5x5,
        )
        .unwrap_err();
        assert!(matches!(err, SheetError::SourceLoad(_)));
    }

    #[test]
    fn uneven_sheet_uses_floor_of_min_cell_side() {
        let sheet =
            SpriteSheet::from_rgba8(103, 81, vec![0; 103 * 81 * 4], GridLayout::Grid4x4).unwrap();
        let (cw, ch) = sheet.cell_size();
        assert!((cw - 25.75).abs() < 1e-9);
        assert!((ch - 20.25).abs() < 1e-9);
        assert_eq!(sheet.crop_size(), 20);
    }

    #[test]
    fn too_small_sheet_is_rejected() {
        assert!(SpriteSheet::from_rgba8(3, 3, vec![0; 36], GridLayout::Grid4x4).is_err());
    }

    #[test]
    fn decoded_source_must_match_requested_layout() {
        let sheet =
            SpriteSheet::from_rgba8(20, 20, vec![0; 20 * 20 * 4], GridLayout::Grid4x4).unwrap();
        let src = SourceRef::Decoded(sheet);
        assert!(load_source(&src, GridLayout::Grid4x4).is_ok());
        assert!(load_source(&src, GridLayout::Grid5x5).is_err());
    }
}
