use crate::{
    foundation::core::mul_div255, render::surface::Surface, sheet::source::SpriteSheet,
};

pub type PremulRgba8 = [u8; 4];

/// Source-over of a premultiplied pixel scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op) as u8;
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv) as u8);

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op) as u8;
        let dc = mul_div255(u16::from(dst[i]), inv) as u8;
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Square region of the sheet drawn scaled into a square of the destination.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blit {
    pub src_x: u32,
    pub src_y: u32,
    pub src_size: u32,
    pub dst_x: f64,
    pub dst_y: f64,
    pub dst_size: f64,
    pub opacity: f32,
}

/// Draw `blit` with bilinear filtering; edge pixels are weighted by their coverage.
///
/// Samples never read outside the source square, so neighbouring cells do not bleed in.
pub fn blit_scaled(dst: &mut Surface, src: &SpriteSheet, blit: Blit) {
    if blit.src_size == 0 || blit.dst_size <= 0.0 || blit.opacity <= 0.0 {
        return;
    }

    let x0 = blit.dst_x.floor().max(0.0) as u32;
    let y0 = blit.dst_y.floor().max(0.0) as u32;
    let x1 = ((blit.dst_x + blit.dst_size).ceil().max(0.0) as u32).min(dst.width());
    let y1 = ((blit.dst_y + blit.dst_size).ceil().max(0.0) as u32).min(dst.height());
    let inv_scale = f64::from(blit.src_size) / blit.dst_size;
    let max_u = f64::from(blit.src_size - 1);

    for py in y0..y1 {
        let cov_y = coverage(f64::from(py), blit.dst_y, blit.dst_size);
        if cov_y <= 0.0 {
            continue;
        }
        let v = ((f64::from(py) + 0.5 - blit.dst_y) * inv_scale - 0.5).clamp(0.0, max_u);

        for px in x0..x1 {
            let cov_x = coverage(f64::from(px), blit.dst_x, blit.dst_size);
            if cov_x <= 0.0 {
                continue;
            }
            let u = ((f64::from(px) + 0.5 - blit.dst_x) * inv_scale - 0.5).clamp(0.0, max_u);

            let sample = sample_bilinear(src, blit.src_x, blit.src_y, u, v);
            let opacity = blit.opacity * (cov_x * cov_y) as f32;
            let out = dst.pixel_mut(px, py);
            let blended = over([out[0], out[1], out[2], out[3]], sample, opacity);
            out.copy_from_slice(&blended);
        }
    }
}

/// Fill an axis-aligned rectangle with a premultiplied colour, anti-aliasing partial pixels.
pub fn fill_rect(
    dst: &mut Surface,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    color: PremulRgba8,
    opacity: f32,
) {
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    let x0 = x.floor().max(0.0) as u32;
    let y0 = y.floor().max(0.0) as u32;
    let x1 = ((x + w).ceil().max(0.0) as u32).min(dst.width());
    let y1 = ((y + h).ceil().max(0.0) as u32).min(dst.height());
    for py in y0..y1 {
        let cov_y = coverage(f64::from(py), y, h);
        for px in x0..x1 {
            let cov = (coverage(f64::from(px), x, w) * cov_y) as f32;
            if cov <= 0.0 {
                continue;
            }
            let out = dst.pixel_mut(px, py);
            let blended = over([out[0], out[1], out[2], out[3]], color, opacity * cov);
            out.copy_from_slice(&blended);
        }
    }
}

fn sample_bilinear(
    src: &SpriteSheet,
    origin_x: u32,
    origin_y: u32,
    u: f64,
    v: f64,
) -> PremulRgba8 {
    let ux = u.floor();
    let vy = v.floor();
    let fx = u - ux;
    let fy = v - vy;
    let x = i64::from(origin_x) + ux as i64;
    let y = i64::from(origin_y) + vy as i64;
    // Stay inside the region at its right/bottom edge.
    let x_next = if fx > 0.0 { x + 1 } else { x };
    let y_next = if fy > 0.0 { y + 1 } else { y };

    let p00 = src.pixel(x, y);
    let p10 = src.pixel(x_next, y);
    let p01 = src.pixel(x, y_next);
    let p11 = src.pixel(x_next, y_next);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = f64::from(p00[i]) * (1.0 - fx) + f64::from(p10[i]) * fx;
        let bottom = f64::from(p01[i]) * (1.0 - fx) + f64::from(p11[i]) * fx;
        out[i] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Fraction of pixel `[p, p+1)` covered by the span `[start, start+len)`.
fn coverage(p: f64, start: f64, len: f64) -> f64 {
    let lo = p.max(start);
    let hi = (p + 1.0).min(start + len);
    (hi - lo).clamp(0.0, 1.0)
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{foundation::core::Canvas, sheet::layout::GridLayout};

    fn surface(w: u32, h: u32) -> Surface {
        let mut s = Surface::new(Canvas {
            width: w,
            height: h,
        })
        .unwrap();
        s.clear([0, 0, 0, 255]);
        s
    }

    #[test]
    fn over_opacity_0_is_noop() {
        let dst = [1, 2, 3, 4];
        let src = [200, 200, 200, 200];
        assert_eq!(over(dst, src, 0.0), dst);
    }

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 40];
        let src = [255, 255, 255, 0];
        assert_eq!(over(dst, src, 1.0), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn over_half_opacity_mixes_evenly() {
        let out = over([0, 0, 0, 255], [255, 255, 255, 255], 0.5);
        assert_eq!(out[3], 255);
        assert!((127..=129).contains(&out[0]));
    }

    #[test]
    fn identity_blit_copies_region() {
        // 8x8 sheet, 4x4 grid -> 2px cells; cell 5 is (2,2)
        let mut rgba = [0u8, 0, 0, 255].repeat(64);
        for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
            px[0] = (i * 3) as u8;
        }
        let sheet = SpriteSheet::from_rgba8(8, 8, rgba, GridLayout::Grid4x4).unwrap();
        let mut dst = surface(2, 2);
        blit_scaled(
            &mut dst,
            &sheet,
            Blit {
                src_x: 2,
                src_y: 2,
                src_size: 2,
                dst_x: 0.0,
                dst_y: 0.0,
                dst_size: 2.0,
                opacity: 1.0,
            },
        );
        assert_eq!(dst.pixel(0, 0).unwrap(), sheet.pixel(2, 2));
        assert_eq!(dst.pixel(1, 1).unwrap(), sheet.pixel(3, 3));
    }

    #[test]
    fn blit_is_clipped_to_surface() {
        let sheet =
            SpriteSheet::from_rgba8(8, 8, [255u8; 256].to_vec(), GridLayout::Grid4x4).unwrap();
        let mut dst = surface(4, 4);
        blit_scaled(
            &mut dst,
            &sheet,
            Blit {
                src_x: 0,
                src_y: 0,
                src_size: 2,
                dst_x: -3.0,
                dst_y: 2.0,
                dst_size: 8.0,
                opacity: 1.0,
            },
        );
        assert_eq!(dst.pixel(0, 0).unwrap(), [0, 0, 0, 255]);
        assert_eq!(dst.pixel(3, 3).unwrap(), [255, 255, 255, 255]);
    }

    #[test]
    fn fill_rect_covers_partial_pixels_partially() {
        let mut dst = surface(4, 1);
        fill_rect(&mut dst, 0.0, 0.0, 1.5, 1.0, [255, 255, 255, 255], 1.0);
        assert_eq!(dst.pixel(0, 0).unwrap()[0], 255);
        let half = dst.pixel(1, 0).unwrap()[0];
        assert!((126..=130).contains(&half));
        assert_eq!(dst.pixel(2, 0).unwrap()[0], 0);
    }
}
