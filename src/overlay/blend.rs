use super::{OverlayAsset, PixelRect};
use crate::types::Frame;

/// Alpha-blends `src` of `overlay` onto `dst` of `frame`.
///
/// Both rectangles must have the same size and lie inside their images.
pub(crate) fn blend_region(frame: &mut Frame, overlay: &OverlayAsset, src: PixelRect, dst: PixelRect) {
    debug_assert_eq!(src.width(), dst.width());
    debug_assert_eq!(src.height(), dst.height());
    debug_assert!(dst.x2 <= frame.width && dst.y2 <= frame.height);
    debug_assert!(src.x2 <= overlay.width && src.y2 <= overlay.height);

    let frame_stride = frame.width as usize * 3;
    for row in 0..dst.height() {
        let fy = (dst.y1 + row) as usize;
        let start = fy * frame_stride + dst.x1 as usize * 3;
        let end = fy * frame_stride + dst.x2 as usize * 3;
        let frame_row = &mut frame.rgb[start..end];

        let overlay_row = overlay.row(src.y1 + row);
        let overlay_row = &overlay_row[src.x1 as usize * 4..src.x2 as usize * 4];

        for (dst_px, src_px) in frame_row.chunks_exact_mut(3).zip(overlay_row.chunks_exact(4)) {
            blend_pixel(dst_px, src_px);
        }
    }
}

#[inline]
fn blend_pixel(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        0 => {}
        255 => dst.copy_from_slice(&src[..3]),
        a => {
            let alpha = a as f32 / 255.0;
            let inv = 1.0 - alpha;
            for c in 0..3 {
                let mixed = alpha * src[c] as f32 + inv * dst[c] as f32;
                dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_alpha_mixes_channels() {
        let mut dst = [0u8, 100, 255];
        blend_pixel(&mut dst, &[255, 100, 0, 128]);
        // 128/255 ≈ 0.502
        assert_eq!(dst, [128, 100, 127]);
    }

    #[test]
    fn extremes_replace_or_keep() {
        let mut dst = [1u8, 2, 3];
        blend_pixel(&mut dst, &[9, 9, 9, 0]);
        assert_eq!(dst, [1, 2, 3]);
        blend_pixel(&mut dst, &[9, 8, 7, 255]);
        assert_eq!(dst, [9, 8, 7]);
    }

    #[test]
    fn region_blend_only_touches_destination() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0]);
        let overlay = OverlayAsset::from_rgba([255u8, 255, 255, 255].repeat(4), 2, 2);
        blend_region(
            &mut frame,
            &overlay,
            PixelRect::new(0, 0, 2, 2),
            PixelRect::new(1, 2, 3, 4),
        );

        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (2..4).contains(&y);
                let expected = if inside { [255; 3] } else { [0; 3] };
                assert_eq!(frame.pixel(x, y), Some(expected), "pixel ({x},{y})");
            }
        }
    }
}
