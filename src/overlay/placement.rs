use anyhow::Result;

use super::{OverlayAsset, blend::blend_region};
use crate::{
    geometry::pixel_bounds,
    types::{Frame, FrameDims, Landmark},
};

/// Half-open pixel rectangle `[x1, x2) x [y1, y2)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRect {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Where an overlay ended up on a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayPlacement {
    /// Scaled overlay size before clipping.
    pub width: u32,
    pub height: u32,
    /// Top-left of the unclipped overlay in frame pixels; may be negative.
    pub origin: (i64, i64),
    /// Part of the scaled overlay that was written.
    pub src: PixelRect,
    /// Part of the frame that was written.
    pub dst: PixelRect,
}

/// Blends `overlay`, scaled by `scale`, centered on pixel `(x, y)`.
///
/// Anchors at or beyond the right/bottom edge, and placements that clip down to nothing,
/// leave the frame untouched and return `Ok(None)`.
pub fn blend_at(
    frame: &mut Frame,
    overlay: &OverlayAsset,
    x: i64,
    y: i64,
    scale: f32,
) -> Result<Option<OverlayPlacement>> {
    let dims = frame.dims();
    if x >= dims.width as i64 || y >= dims.height as i64 {
        return Ok(None);
    }

    let width = scaled_len(overlay.width, scale);
    let height = scaled_len(overlay.height, scale);
    if width == 0 || height == 0 {
        return Ok(None);
    }

    let origin = (x - (width / 2) as i64, y - (height / 2) as i64);
    let Some(placement) = place(origin, width, height, dims) else {
        return Ok(None);
    };

    let resized = overlay.resized(width, height)?;
    blend_region(frame, &resized, placement.src, placement.dst);
    log::trace!("anchored overlay at ({x},{y}): {placement:?}");
    Ok(Some(placement))
}

/// Blends `overlay` across the horizontal span of `landmarks`, sitting on their top edge.
///
/// The overlay width is the landmark span times `scale`; its height follows the overlay's own
/// aspect ratio. The result is clipped to the frame.
pub fn fit_to_landmarks(
    frame: &mut Frame,
    overlay: &OverlayAsset,
    landmarks: &[Landmark],
    scale: f32,
) -> Result<Option<OverlayPlacement>> {
    let dims = frame.dims();
    let Some((origin, width, height)) = fitted_geometry(overlay, landmarks, scale, dims) else {
        return Ok(None);
    };

    let Some(placement) = place(origin, width, height, dims) else {
        return Ok(None);
    };

    let resized = overlay.resized(width, height)?;
    blend_region(frame, &resized, placement.src, placement.dst);
    log::trace!("fitted overlay on {} landmarks: {placement:?}", landmarks.len());
    Ok(Some(placement))
}

/// Unclipped origin and size of a landmark-fitted overlay, or `None` when it collapses.
pub(crate) fn fitted_geometry(
    overlay: &OverlayAsset,
    landmarks: &[Landmark],
    scale: f32,
    dims: FrameDims,
) -> Option<((i64, i64), u32, u32)> {
    let bounds = pixel_bounds(landmarks, dims)?;
    let span = bounds.width();

    let width = (span as f64 * scale as f64).max(0.0) as i64;
    let height = (width as f64 * overlay.height as f64 / overlay.width as f64) as i64;
    if width <= 0 || height <= 0 {
        return None;
    }

    let origin = (bounds.x_min - (width - span) / 2, bounds.y_min - height / 2);
    Some((origin, u32::try_from(width).ok()?, u32::try_from(height).ok()?))
}

fn scaled_len(len: u32, scale: f32) -> u32 {
    (len as f64 * scale as f64).round().max(0.0) as u32
}

/// Clips a `width` x `height` rectangle at `origin` to the frame.
fn place(origin: (i64, i64), width: u32, height: u32, dims: FrameDims) -> Option<OverlayPlacement> {
    let (ox, oy) = origin;
    let (sx1, dx1, sx2, dx2) = clip_axis(ox, width, dims.width)?;
    let (sy1, dy1, sy2, dy2) = clip_axis(oy, height, dims.height)?;

    Some(OverlayPlacement {
        width,
        height,
        origin,
        src: PixelRect::new(sx1, sy1, sx2, sy2),
        dst: PixelRect::new(dx1, dy1, dx2, dy2),
    })
}

/// Returns `(src_start, dst_start, src_end, dst_end)` along one axis.
fn clip_axis(offset: i64, len: u32, bound: u32) -> Option<(u32, u32, u32, u32)> {
    let dst_start = offset.max(0);
    let dst_end = (offset + len as i64).min(bound as i64);
    if dst_start >= dst_end {
        return None;
    }
    let src_start = dst_start - offset;
    let src_end = dst_end - offset;
    Some((
        src_start as u32,
        dst_start as u32,
        src_end as u32,
        dst_end as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> OverlayAsset {
        OverlayAsset::from_rgba(px.repeat(width as usize * height as usize), width, height)
    }

    fn assert_within(placement: &OverlayPlacement, frame: &Frame) {
        let d = placement.dst;
        assert!(d.x1 <= d.x2 && d.x2 <= frame.width, "{d:?}");
        assert!(d.y1 <= d.y2 && d.y2 <= frame.height, "{d:?}");
        assert_eq!(placement.src.width(), d.width());
        assert_eq!(placement.src.height(), d.height());
    }

    #[test]
    fn anchor_outside_frame_is_noop() {
        let mut frame = Frame::filled(64, 48, [12, 34, 56]);
        let before = frame.rgb.clone();
        let nail = solid(10, 10, [255, 0, 0, 255]);

        assert!(blend_at(&mut frame, &nail, 64, 48, 1.0).unwrap().is_none());
        assert!(blend_at(&mut frame, &nail, 64, 10, 1.0).unwrap().is_none());
        assert!(blend_at(&mut frame, &nail, -40, -40, 1.0).unwrap().is_none());
        assert_eq!(frame.rgb, before);
    }

    #[test]
    fn opaque_pixels_replace_background() {
        let mut frame = Frame::filled(20, 20, [40, 40, 40]);
        let nail = solid(4, 4, [250, 10, 20, 255]);

        let placement = blend_at(&mut frame, &nail, 10, 10, 1.0).unwrap().unwrap();
        assert_eq!(placement.dst, PixelRect::new(8, 8, 12, 12));
        for y in 0..20 {
            for x in 0..20 {
                let inside = (8..12).contains(&x) && (8..12).contains(&y);
                let expected = if inside { [250, 10, 20] } else { [40, 40, 40] };
                assert_eq!(frame.pixel(x, y), Some(expected));
            }
        }
    }

    #[test]
    fn transparent_pixels_keep_background() {
        let mut frame = Frame::filled(20, 20, [40, 50, 60]);
        let before = frame.rgb.clone();
        let clear = solid(6, 6, [250, 10, 20, 0]);

        let placement = blend_at(&mut frame, &clear, 10, 10, 2.0).unwrap().unwrap();
        assert_eq!((placement.width, placement.height), (12, 12));
        assert_eq!(frame.rgb, before);
    }

    #[test]
    fn corners_are_clipped() {
        let nail = solid(9, 7, [1, 2, 3, 255]);
        for &(x, y) in &[(0, 0), (31, 0), (0, 23), (31, 23), (-3, 5), (5, -3)] {
            for &scale in &[0.5f32, 1.0, 2.5] {
                let mut frame = Frame::filled(32, 24, [0, 0, 0]);
                let len = frame.rgb.len();
                if let Some(p) = blend_at(&mut frame, &nail, x, y, scale).unwrap() {
                    assert_within(&p, &frame);
                }
                assert_eq!(frame.rgb.len(), len);
            }
        }
    }

    #[test]
    fn clipped_source_matches_destination() {
        let mut frame = Frame::filled(10, 10, [0, 0, 0]);
        // Left half red, right half green, so we can tell which columns were used.
        let mut rgba = Vec::new();
        for _y in 0..4 {
            for x in 0..4 {
                let px = if x < 2 { [255, 0, 0, 255] } else { [0, 255, 0, 255] };
                rgba.extend_from_slice(&px);
            }
        }
        let asset = OverlayAsset::from_rgba(rgba, 4, 4);

        // Anchor on the left edge: only the right (green) half survives.
        let placement = blend_at(&mut frame, &asset, 0, 5, 1.0).unwrap().unwrap();
        assert_eq!(placement.origin, (-2, 3));
        assert_eq!(placement.src, PixelRect::new(2, 0, 4, 4));
        assert_eq!(placement.dst, PixelRect::new(0, 3, 2, 7));
        assert_eq!(frame.pixel(0, 3), Some([0, 255, 0]));
        assert_eq!(frame.pixel(1, 6), Some([0, 255, 0]));
        assert_eq!(frame.pixel(2, 3), Some([0, 0, 0]));
    }

    #[test]
    fn coincident_landmarks_fit_nothing() {
        let mut frame = Frame::filled(64, 48, [9, 9, 9]);
        let before = frame.rgb.clone();
        let glasses = solid(20, 10, [0, 0, 0, 255]);
        let p = Landmark::new(0.5, 0.5);

        assert!(fitted_geometry(&glasses, &[p; 4], 1.2, frame.dims()).is_none());
        assert!(fit_to_landmarks(&mut frame, &glasses, &[p; 4], 1.2).unwrap().is_none());
        assert!(fit_to_landmarks(&mut frame, &glasses, &[], 1.2).unwrap().is_none());
        assert_eq!(frame.rgb, before);
    }

    #[test]
    fn eyewear_scenario() {
        let mut frame = Frame::filled(640, 480, [90, 90, 90]);
        let glasses = solid(40, 20, [0, 0, 0, 255]);
        let eyes = [
            Landmark::new(0.3, 0.4),
            Landmark::new(0.35, 0.4),
            Landmark::new(0.6, 0.4),
            Landmark::new(0.65, 0.4),
        ];

        let placement = fit_to_landmarks(&mut frame, &glasses, &eyes, 1.2)
            .unwrap()
            .unwrap();
        assert_eq!((placement.width, placement.height), (268, 134));
        assert_eq!(placement.origin, (170, 125));
        assert_eq!(placement.dst, PixelRect::new(170, 125, 438, 259));
        // Centered on the eye span [192, 416].
        assert_eq!(placement.dst.x1 + placement.width / 2, (192 + 416) / 2);

        assert_eq!(frame.pixel(170, 125), Some([0, 0, 0]));
        assert_eq!(frame.pixel(437, 258), Some([0, 0, 0]));
        assert_eq!(frame.pixel(169, 125), Some([90, 90, 90]));
        assert_eq!(frame.pixel(438, 258), Some([90, 90, 90]));
    }

    #[test]
    fn fitted_overlay_near_edge_is_clipped() {
        let mut frame = Frame::filled(100, 80, [0, 0, 0]);
        let glasses = solid(30, 10, [200, 200, 200, 255]);
        let eyes = [Landmark::new(0.0, 0.02), Landmark::new(0.98, 0.02)];

        let placement = fit_to_landmarks(&mut frame, &glasses, &eyes, 1.5)
            .unwrap()
            .unwrap();
        assert!(placement.origin.0 < 0 && placement.origin.1 < 0);
        assert_within(&placement, &frame);
        assert_eq!(placement.dst.x1, 0);
        assert_eq!(placement.dst.x2, 100);
    }
}
