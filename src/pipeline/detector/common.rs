use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};

use crate::types::{Frame, Landmark, LandmarkSet};

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

#[derive(Clone, Debug)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

pub fn load_session(model_path: &std::path::Path) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;
    Ok(session)
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(3);
    if frame.rgb.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgb.len(),
            expected_len
        ));
    }
    Ok(())
}

/// Letterboxes `frame` into a `target_size` square NHWC tensor with values in `[0, 1]`.
pub fn prepare_frame_with_size(
    frame: &Frame,
    target_size: u32,
) -> Result<(Array4<f32>, LetterboxInfo)> {
    check_frame(frame)?;

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgb.clone(),
        fir::PixelType::U8x3,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target_size - new_w) / 2) as usize;
    let pad_y = ((target_size - new_h) / 2) as usize;
    let side = target_size as usize;
    let mut input = Array4::<f32>::zeros((1, side, side, 3));
    for (row, src_row) in resized.chunks_exact(new_w as usize * 3).enumerate() {
        for (col, px) in src_row.chunks_exact(3).enumerate() {
            for c in 0..3 {
                input[[0, pad_y + row, pad_x + col, c]] = px[c] as f32 / 255.0;
            }
        }
    }

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

/// Splits a flat model output into `count` landmarks of `stride` values, keeping x, y, z.
pub fn decode_landmarks(flat: &[f32], count: usize, stride: usize) -> Result<Vec<[f32; 3]>> {
    if stride < 2 {
        return Err(anyhow!("landmark stride must be at least 2, got {stride}"));
    }
    if flat.len() < count * stride {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            count * stride
        ));
    }

    Ok(flat
        .chunks_exact(stride)
        .take(count)
        .map(|chunk| [chunk[0], chunk[1], chunk.get(2).copied().unwrap_or(0.0)])
        .collect())
}

/// Maps landmarks from letterboxed model space back to frame pixels.
pub fn project_landmarks(landmarks: &[[f32; 3]], letterbox: &LetterboxInfo) -> Vec<(f32, f32)> {
    landmarks
        .iter()
        .map(|[x, y, _z]| {
            let px = (x - letterbox.pad_x) / letterbox.scale;
            let py = (y - letterbox.pad_y) / letterbox.scale;
            let cx = px.clamp(0.0, (letterbox.orig_w.saturating_sub(1)) as f32);
            let cy = py.clamp(0.0, (letterbox.orig_h.saturating_sub(1)) as f32);
            (cx, cy)
        })
        .collect()
}

/// Converts frame pixel coordinates to a normalized landmark set.
pub fn normalize(points: &[(f32, f32)], width: u32, height: u32) -> LandmarkSet {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    LandmarkSet::new(
        points
            .iter()
            .map(|&(x, y)| Landmark::new(x / w, y / h))
            .collect(),
    )
}

pub fn prepare_rotated_crop(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    output_size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    check_frame(frame)?;

    let mut data =
        Vec::with_capacity((output_size as usize).saturating_mul(output_size as usize * 3));
    let half = output_size as f32 / 2.0;
    let scale = side / output_size as f32;
    let cos = angle.cos();
    let sin = angle.sin();

    for y in 0..output_size {
        let dy = (y as f32 + 0.5 - half) * scale;
        for x in 0..output_size {
            let dx = (x as f32 + 0.5 - half) * scale;
            let src_x = center.0 + dx * cos - dy * sin;
            let src_y = center.1 + dx * sin + dy * cos;
            data.extend_from_slice(&sample_rgb(frame, src_x, src_y));
        }
    }

    let array =
        Array4::<f32>::from_shape_vec((1, output_size as usize, output_size as usize, 3), data)
            .map_err(|err| anyhow!("failed to build rotated crop tensor: {err}"))?;

    let transform = CropTransform {
        center,
        side,
        angle,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((array, transform))
}

impl CropTransform {
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let scale = self.side / self.output_size as f32;
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let cos = self.angle.cos();
        let sin = self.angle.sin();
        let ox = self.center.0 + dx * cos - dy * sin;
        let oy = self.center.1 + dx * sin + dy * cos;
        (
            ox.clamp(0.0, (self.orig_w.saturating_sub(1)) as f32),
            oy.clamp(0.0, (self.orig_h.saturating_sub(1)) as f32),
        )
    }

    pub fn project_all(&self, landmarks: &[[f32; 3]]) -> Vec<(f32, f32)> {
        landmarks.iter().map(|[x, y, _z]| self.project(*x, *y)).collect()
    }
}

fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if x.is_nan() || y.is_nan() {
        return [0.0, 0.0, 0.0];
    }
    let x0 = x.floor();
    let y0 = y.floor();

    let (w, h) = (frame.width as i32, frame.height as i32);
    let fetch = |cx: f32, cy: f32| -> [f32; 3] {
        let ix = cx as i32;
        let iy = cy as i32;
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0, 0.0, 0.0];
        }
        let idx = (iy as usize * frame.width as usize + ix as usize) * 3;
        match frame.rgb.get(idx..idx + 3) {
            Some(px) => [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ],
            None => [0.0, 0.0, 0.0],
        }
    };

    let fx = x - x0;
    let fy = y - y0;
    let c00 = fetch(x0, y0);
    let c10 = fetch(x0 + 1.0, y0);
    let c01 = fetch(x0, y0 + 1.0);
    let c11 = fetch(x0 + 1.0, y0 + 1.0);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    [
        lerp(lerp(c00[0], c10[0], fx), lerp(c01[0], c11[0], fx), fy),
        lerp(lerp(c00[1], c10[1], fx), lerp(c01[1], c11[1], fx), fy),
        lerp(lerp(c00[2], c10[2], fx), lerp(c01[2], c11[2], fx), fy),
    ]
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn letterbox_pads_short_side() {
        let frame = Frame::filled(64, 32, [255, 0, 0]);
        let (input, letterbox) = prepare_frame_with_size(&frame, 16).unwrap();
        assert_eq!(input.shape(), &[1, 16, 16, 3]);
        assert_relative_eq!(letterbox.scale, 0.25);
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0.0, 4.0));
        // Padding rows stay black, image rows are red.
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert_relative_eq!(input[[0, 8, 8, 0]], 1.0);
        assert_eq!(input[[0, 8, 8, 1]], 0.0);
    }

    #[test]
    fn projection_undoes_letterbox() {
        let letterbox = LetterboxInfo {
            scale: 0.25,
            pad_x: 0.0,
            pad_y: 4.0,
            orig_w: 64,
            orig_h: 32,
        };
        let projected = project_landmarks(&[[8.0, 8.0, 0.0]], &letterbox);
        assert_eq!(projected, vec![(32.0, 16.0)]);

        let set = normalize(&projected, 64, 32);
        assert_eq!(set.points(), &[Landmark::new(0.5, 0.5)]);
    }

    #[test]
    fn decode_respects_stride() {
        let flat = [1.0, 2.0, 3.0, 9.0, 9.0, 4.0, 5.0, 6.0, 9.0, 9.0];
        let decoded = decode_landmarks(&flat, 2, 5).unwrap();
        assert_eq!(decoded, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert!(decode_landmarks(&flat, 3, 5).is_err());
    }

    #[test]
    fn unrotated_crop_projects_center() {
        let transform = CropTransform {
            center: (50.0, 40.0),
            side: 20.0,
            angle: 0.0,
            output_size: 10,
            orig_w: 100,
            orig_h: 80,
        };
        assert_eq!(transform.project(5.0, 5.0), (50.0, 40.0));
        assert_eq!(transform.project(0.0, 0.0), (40.0, 30.0));
    }
}
