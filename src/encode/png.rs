use std::path::Path;

use crate::{
    encode::ffmpeg::ensure_parent_dir,
    foundation::error::{SheetError, SheetResult},
    render::surface::FrameRGBA,
};

/// Write `frame` as a straight-alpha PNG, creating parent directories as needed.
pub fn write_png(frame: &FrameRGBA, path: &Path) -> SheetResult<()> {
    ensure_parent_dir(path)?;
    let img = frame.to_rgba_image()?;
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| SheetError::encode(format!("write png '{}': {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "png written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_readable_png() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("frame.png");
        let frame = FrameRGBA {
            width: 2,
            height: 1,
            data: vec![255, 0, 0, 255, 64, 0, 0, 128],
            premultiplied: true,
        };
        write_png(&frame, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [128, 0, 0, 128]);
    }
}
