use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::{session::Session, value::Tensor};

use super::common::{LetterboxInfo, load_session, prepare_frame_with_size, sigmoid};
use crate::types::Frame;

/// Input size, feature maps and keypoint count of a single-shot region detector.
#[derive(Clone, Copy, Debug)]
pub struct SsdLayout {
    pub input_size: u32,
    /// (stride, anchors per grid cell) of each feature map, in output order.
    pub layers: &'static [(u32, usize)],
    pub keypoints: usize,
}

/// MediaPipe palm detector: 2016 anchors, 7 keypoints.
pub const PALM_LAYOUT: SsdLayout = SsdLayout {
    input_size: 192,
    layers: &[(8, 2), (16, 6)],
    keypoints: 7,
};

/// MediaPipe short-range face detector: 896 anchors, eyes/nose/mouth/ears.
pub const FACE_LAYOUT: SsdLayout = SsdLayout {
    input_size: 128,
    layers: &[(8, 2), (16, 6)],
    keypoints: 6,
};

/// MediaPipe pose detector: 2254 anchors, hip centre and crown among 4 keypoints.
pub const POSE_LAYOUT: SsdLayout = SsdLayout {
    input_size: 224,
    layers: &[(8, 2), (16, 2), (32, 6)],
    keypoints: 4,
};

/// A detected box with its keypoints, in frame pixels.
#[derive(Clone, Debug)]
pub struct Region {
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub score: f32,
}

impl Region {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }
}

#[derive(Clone, Debug)]
pub struct RegionDetectorConfig {
    pub layout: SsdLayout,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl RegionDetectorConfig {
    pub fn new(layout: SsdLayout) -> Self {
        Self {
            layout,
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 32,
        }
    }
}

pub struct RegionDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: RegionDetectorConfig,
}

impl RegionDetector {
    pub fn new(model_path: &Path, cfg: RegionDetectorConfig) -> Result<Self> {
        let session = load_session(model_path).with_context(|| {
            format!("failed to load region detector from {}", model_path.display())
        })?;

        Ok(Self {
            session,
            anchors: generate_anchors(&cfg.layout),
            cfg,
        })
    }

    /// Regions sorted by descending score.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>> {
        let (input, letterbox) = prepare_frame_with_size(frame, self.cfg.layout.input_size)?;
        let tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run region detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "region detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let box_and_landmarks = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;

        let box_shape = box_and_landmarks.shape().to_vec();
        let score_shape = scores.shape().to_vec();

        decode_outputs(
            box_and_landmarks
                .as_slice()
                .ok_or_else(|| anyhow!("region boxes not contiguous"))?,
            &box_shape,
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("region scores not contiguous"))?,
            &score_shape,
            &self.anchors,
            &letterbox,
            &self.cfg,
        )
    }
}

/// SSD anchor centers, fixed unit size.
pub fn generate_anchors(layout: &SsdLayout) -> Vec<[f32; 2]> {
    let mut anchors = Vec::new();
    for &(stride, per_cell) in layout.layers {
        let grid = layout.input_size / stride;
        for y in 0..grid {
            let cy = (y as f32 + 0.5) / grid as f32;
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                for _ in 0..per_cell {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

fn decode_outputs(
    box_landmark: &[f32],
    box_shape: &[usize],
    scores: &[f32],
    score_shape: &[usize],
    anchors: &[[f32; 2]],
    letterbox: &LetterboxInfo,
    cfg: &RegionDetectorConfig,
) -> Result<Vec<Region>> {
    if box_shape.len() < 3 {
        return Err(anyhow!(
            "unexpected box shape {:?}, need [batch, anchors, features]",
            box_shape
        ));
    }
    if score_shape.len() < 3 {
        return Err(anyhow!(
            "unexpected score shape {:?}, need [batch, anchors, 1]",
            score_shape
        ));
    }

    let anchor_dim = box_shape[box_shape.len() - 2];
    let feature_dim = box_shape[box_shape.len() - 1];
    let score_anchor_dim = score_shape[score_shape.len() - 2];
    let score_feature_dim = score_shape[score_shape.len() - 1];

    let keypoints = cfg.layout.keypoints;
    if feature_dim < 4 + keypoints * 2 {
        return Err(anyhow!("box feature dimension too small: {feature_dim}"));
    }
    if anchor_dim != score_anchor_dim {
        return Err(anyhow!(
            "anchor dimension mismatch between boxes ({anchor_dim}) and scores ({score_anchor_dim})"
        ));
    }

    let anchor_count = anchors.len().min(anchor_dim);
    let pad_bias_x = letterbox.pad_x / letterbox.scale;
    let pad_bias_y = letterbox.pad_y / letterbox.scale;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let target_input = cfg.layout.input_size as f32;

    let mut candidates = Vec::new();
    for (anchor_idx, anchor) in anchors.iter().take(anchor_count).enumerate() {
        let raw_score = *scores
            .get(anchor_idx * score_feature_dim)
            .ok_or_else(|| anyhow!("missing score for anchor {anchor_idx}"))?;
        let score = sigmoid(raw_score);
        if score < cfg.score_threshold {
            continue;
        }

        let offset = anchor_idx * feature_dim;
        let features = box_landmark
            .get(offset..offset + 4 + keypoints * 2)
            .ok_or_else(|| anyhow!("missing box features for anchor {anchor_idx}"))?;

        let cx = features[0] / target_input + anchor[0];
        let cy = features[1] / target_input + anchor[1];
        let hw = features[2] / target_input / 2.0;
        let hh = features[3] / target_input / 2.0;

        let mut bbox = [
            (cx - hw) * scale - pad_bias_x,
            (cy - hh) * scale - pad_bias_y,
            (cx + hw) * scale - pad_bias_x,
            (cy + hh) * scale - pad_bias_y,
        ];
        if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
            continue;
        }
        clamp_box(&mut bbox, letterbox.orig_w, letterbox.orig_h);

        let landmarks = features[4..]
            .chunks_exact(2)
            .map(|l| {
                (
                    (l[0] / target_input + anchor[0]) * scale - pad_bias_x,
                    (l[1] / target_input + anchor[1]) * scale - pad_bias_y,
                )
            })
            .collect();

        candidates.push(Region {
            bbox,
            landmarks,
            score,
        });
    }

    let kept = nms(&candidates, cfg.nms_threshold, cfg.top_k);
    Ok(kept
        .into_iter()
        .filter_map(|idx| candidates.get(idx).cloned())
        .collect())
}

/// Center, side and rotation of the square crop fed to the hand landmark model.
pub fn crop_from_palm(region: &Region) -> ((f32, f32), f32, f32) {
    let center = if region.landmarks.is_empty() {
        region.center()
    } else {
        let (sum_x, sum_y) = region
            .landmarks
            .iter()
            .fold((0.0_f32, 0.0_f32), |acc, p| (acc.0 + p.0, acc.1 + p.1));
        (
            sum_x / region.landmarks.len() as f32,
            sum_y / region.landmarks.len() as f32,
        )
    };

    let base_w = (region.bbox[2] - region.bbox[0]).abs();
    let base_h = (region.bbox[3] - region.bbox[1]).abs();
    let landmark_span = if region.landmarks.is_empty() {
        0.0
    } else {
        let (min_x, max_x, min_y, max_y) = region
            .landmarks
            .iter()
            .fold((f32::MAX, f32::MIN, f32::MAX, f32::MIN), |acc, (x, y)| {
                (acc.0.min(*x), acc.1.max(*x), acc.2.min(*y), acc.3.max(*y))
            });
        (max_x - min_x).max(max_y - min_y)
    };
    // Expand generously to avoid cropping fingers away.
    let side = base_w.max(base_h).max(landmark_span).max(80.0) * 2.4;

    (center, side, estimate_orientation(region))
}

/// Square crop around a face box, levelled on the eye line (keypoints 0 and 1).
pub fn crop_from_face(region: &Region, expansion: f32) -> ((f32, f32), f32, f32) {
    let w = region.bbox[2] - region.bbox[0];
    let h = region.bbox[3] - region.bbox[1];
    let side = w.max(h) * expansion;

    let angle = match region.landmarks.as_slice() {
        [a, b, ..] => (b.1 - a.1).atan2(b.0 - a.0),
        _ => 0.0,
    };
    (region.center(), side, angle)
}

/// Square crop centred on the hips (keypoint 0), upright towards the crown (keypoint 1).
pub fn crop_from_body(region: &Region, expansion: f32) -> ((f32, f32), f32, f32) {
    let [hips, crown, ..] = region.landmarks.as_slice() else {
        let w = region.bbox[2] - region.bbox[0];
        let h = region.bbox[3] - region.bbox[1];
        return (region.center(), w.max(h) * expansion, 0.0);
    };

    let (vx, vy) = (crown.0 - hips.0, crown.1 - hips.1);
    let side = 2.0 * (vx * vx + vy * vy).sqrt() * expansion;
    (*hips, side, vx.atan2(-vy))
}

fn estimate_orientation(region: &Region) -> f32 {
    if region.landmarks.len() < 2 {
        return 0.0;
    }

    // Principal direction via simple 2x2 covariance eigvec
    let n = region.landmarks.len() as f32;
    let (sx, sy) = region
        .landmarks
        .iter()
        .fold((0.0_f32, 0.0_f32), |acc, (x, y)| (acc.0 + x, acc.1 + y));
    let mean = (sx / n, sy / n);

    let (mut cov_xx, mut cov_xy, mut cov_yy) = (0.0, 0.0, 0.0);
    for (x, y) in &region.landmarks {
        let dx = x - mean.0;
        let dy = y - mean.1;
        cov_xx += dx * dx;
        cov_xy += dx * dy;
        cov_yy += dy * dy;
    }
    cov_xx /= n;
    cov_xy /= n;
    cov_yy /= n;

    let trace = cov_xx + cov_yy;
    let det = cov_xx * cov_yy - cov_xy * cov_xy;
    let lambda1 = (trace * 0.5 + ((trace * 0.5).powi(2) - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if cov_xy.abs() > 1e-6 {
        (lambda1 - cov_yy, cov_xy)
    } else if cov_xx >= cov_yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    // Palm upright in the crop.
    vy.atan2(vx) - PI * 0.5
}

fn nms(candidates: &[Region], threshold: f32, top_k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|a, b| {
        candidates[*b]
            .score
            .partial_cmp(&candidates[*a].score)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    'outer: for &idx in &order {
        for &k in &keep {
            if iou(&candidates[idx].bbox, &candidates[k].bbox) >= threshold {
                continue 'outer;
            }
        }
        keep.push(idx);
        if keep.len() >= top_k {
            break;
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn clamp_box(bbox: &mut [f32; 4], w: u32, h: u32) {
    let max_w = (w.saturating_sub(1)) as f32;
    let max_h = (h.saturating_sub(1)) as f32;
    bbox[0] = bbox[0].clamp(0.0, max_w);
    bbox[1] = bbox[1].clamp(0.0, max_h);
    bbox[2] = bbox[2].clamp(0.0, max_w);
    bbox[3] = bbox[3].clamp(0.0, max_h);
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_4;

    use approx::assert_relative_eq;

    use super::*;

    fn region(bbox: [f32; 4], score: f32) -> Region {
        Region {
            bbox,
            landmarks: Vec::new(),
            score,
        }
    }

    #[test]
    fn anchor_grids_match_model_layouts() {
        let palm = generate_anchors(&PALM_LAYOUT);
        assert_eq!(palm.len(), 2016);
        assert_eq!(palm[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(palm[1], palm[0]);
        assert_eq!(palm[1152], [0.5 / 12.0, 0.5 / 12.0]);

        assert_eq!(generate_anchors(&FACE_LAYOUT).len(), 896);
        assert_eq!(generate_anchors(&POSE_LAYOUT).len(), 2254);
    }

    #[test]
    fn nms_drops_overlapping_lower_scores() {
        let candidates = vec![
            region([0.0, 0.0, 10.0, 10.0], 0.6),
            region([1.0, 1.0, 11.0, 11.0], 0.9),
            region([50.0, 50.0, 60.0, 60.0], 0.7),
        ];
        assert_eq!(nms(&candidates, 0.3, 32), vec![1, 2]);
        assert_eq!(nms(&candidates, 0.3, 1), vec![1]);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = [0.0, 0.0, 2.0, 2.0];
        assert_eq!(iou(&a, &[5.0, 5.0, 6.0, 6.0]), 0.0);
        assert_relative_eq!(iou(&a, &a), 1.0);
    }

    #[test]
    fn decode_keeps_confident_anchor() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        let features = 4 + PALM_LAYOUT.keypoints * 2;
        let mut boxes = vec![0.0f32; 2 * features];
        // 96px box centered on the first anchor.
        boxes[2] = 96.0;
        boxes[3] = 96.0;
        let scores = vec![5.0, -5.0];
        let letterbox = LetterboxInfo {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        };

        let regions = decode_outputs(
            &boxes,
            &[1, 2, features],
            &scores,
            &[1, 2, 1],
            &anchors,
            &letterbox,
            &RegionDetectorConfig::new(PALM_LAYOUT),
        )
        .unwrap();

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, [48.0, 48.0, 144.0, 144.0]);
        assert_eq!(regions[0].landmarks.len(), PALM_LAYOUT.keypoints);
        assert_eq!(regions[0].landmarks[0], (96.0, 96.0));
    }

    #[test]
    fn decode_rejects_narrow_features() {
        let letterbox = LetterboxInfo {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 128,
            orig_h: 128,
        };
        let result = decode_outputs(
            &[0.0; 8],
            &[1, 1, 8],
            &[0.0],
            &[1, 1, 1],
            &[[0.5, 0.5]],
            &letterbox,
            &RegionDetectorConfig::new(FACE_LAYOUT),
        );
        assert!(result.is_err());
    }

    #[test]
    fn crop_grows_small_palms() {
        let (center, side, angle) = crop_from_palm(&region([10.0, 10.0, 30.0, 30.0], 0.9));
        assert_eq!(center, (20.0, 20.0));
        assert_relative_eq!(side, 80.0 * 2.4);
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn face_crop_levels_eye_line() {
        let mut face = region([100.0, 100.0, 200.0, 180.0], 0.9);
        face.landmarks = vec![(120.0, 130.0), (170.0, 180.0)];

        let (center, side, angle) = crop_from_face(&face, 1.5);
        assert_eq!(center, (150.0, 140.0));
        assert_relative_eq!(side, 150.0);
        assert_relative_eq!(angle, FRAC_PI_4);
    }

    #[test]
    fn upright_body_crop_has_no_rotation() {
        let mut body = region([0.0, 0.0, 100.0, 300.0], 0.9);
        body.landmarks = vec![(50.0, 200.0), (50.0, 100.0)];

        let (center, side, angle) = crop_from_body(&body, 1.25);
        assert_eq!(center, (50.0, 200.0));
        assert_relative_eq!(side, 250.0);
        assert_relative_eq!(angle, 0.0);
    }

    #[test]
    fn body_crop_without_keypoints_uses_box() {
        let (center, side, angle) = crop_from_body(&region([0.0, 0.0, 40.0, 80.0], 0.9), 1.25);
        assert_eq!(center, (20.0, 40.0));
        assert_relative_eq!(side, 100.0);
        assert_eq!(angle, 0.0);
    }
}
