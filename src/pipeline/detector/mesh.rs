use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ndarray::Array4;
use ort::{session::Session, value::Tensor};

use super::{
    LandmarkDetector,
    common::{self, CropTransform, LetterboxInfo, load_session, sigmoid},
    region::{
        FACE_LAYOUT, POSE_LAYOUT, Region, RegionDetector, RegionDetectorConfig, SsdLayout,
        crop_from_body, crop_from_face,
    },
};
use crate::types::{Frame, LandmarkSet, Modality};

/// How a detected region becomes the landmark model's square input crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropStyle {
    /// Box-centred, levelled on the eyes.
    Face,
    /// Hip-centred, upright towards the crown.
    Body,
}

impl CropStyle {
    fn crop(self, region: &Region, expansion: f32) -> ((f32, f32), f32, f32) {
        match self {
            CropStyle::Face => crop_from_face(region, expansion),
            CropStyle::Body => crop_from_body(region, expansion),
        }
    }
}

/// Output layout of a single-stage landmark model, plus the region detector that feeds it.
#[derive(Clone, Debug)]
pub struct MeshModelConfig {
    pub modality: Modality,
    pub input_size: u32,
    pub num_landmarks: usize,
    /// Values per landmark in the first output (x, y, then extras).
    pub stride: usize,
    /// Index of the presence score output, if the model has one.
    pub score_output: Option<usize>,
    pub score_is_logit: bool,
    pub score_threshold: f32,
    pub region_layout: SsdLayout,
    pub crop_style: CropStyle,
    /// Crop side relative to the detected region.
    pub crop_expansion: f32,
}

impl MeshModelConfig {
    /// MediaPipe face mesh: 468 points, presence logit on the second output.
    pub fn face_mesh() -> Self {
        Self {
            modality: Modality::Face,
            input_size: 192,
            num_landmarks: 468,
            stride: 3,
            score_output: Some(1),
            score_is_logit: true,
            score_threshold: 0.5,
            region_layout: FACE_LAYOUT,
            crop_style: CropStyle::Face,
            crop_expansion: 1.5,
        }
    }

    /// MediaPipe BlazePose landmarks: 33 body points plus 6 auxiliary ones, 5 values each.
    pub fn pose() -> Self {
        Self {
            modality: Modality::Pose,
            input_size: 256,
            num_landmarks: 33,
            stride: 5,
            score_output: Some(1),
            score_is_logit: false,
            score_threshold: 0.5,
            region_layout: POSE_LAYOUT,
            crop_style: CropStyle::Body,
            crop_expansion: 1.25,
        }
    }
}

enum InputMapping {
    Letterbox(LetterboxInfo),
    Crop(CropTransform),
}

/// Runs one landmark model and reports at most one subject.
///
/// With a region detector attached, the model sees a crop around the best detection. Without
/// one it sees the whole letterboxed frame.
pub struct MeshDetector {
    session: Session,
    cfg: MeshModelConfig,
    regions: Option<RegionDetector>,
}

impl MeshDetector {
    pub fn new(model_path: &Path, cfg: MeshModelConfig) -> Result<Self> {
        let session = load_session(model_path)?;
        log::info!(
            "{} landmark model ready using {}",
            cfg.modality.label(),
            model_path.display()
        );
        Ok(Self {
            session,
            cfg,
            regions: None,
        })
    }

    pub fn with_region_detector(mut self, model_path: &Path) -> Result<Self> {
        let detector =
            RegionDetector::new(model_path, RegionDetectorConfig::new(self.cfg.region_layout))?;
        log::info!(
            "{} region detector ready using {}",
            self.cfg.modality.label(),
            model_path.display()
        );
        self.regions = Some(detector);
        Ok(self)
    }

    fn prepare(&mut self, frame: &Frame) -> Result<Option<(Array4<f32>, InputMapping)>> {
        let Some(detector) = self.regions.as_mut() else {
            let (input, letterbox) = common::prepare_frame_with_size(frame, self.cfg.input_size)?;
            return Ok(Some((input, InputMapping::Letterbox(letterbox))));
        };

        let Some(region) = detector.detect(frame)?.into_iter().next() else {
            return Ok(None);
        };
        let (center, side, angle) = self.cfg.crop_style.crop(&region, self.cfg.crop_expansion);
        let (input, transform) =
            common::prepare_rotated_crop(frame, center, side, angle, self.cfg.input_size)?;
        Ok(Some((input, InputMapping::Crop(transform))))
    }
}

impl LandmarkDetector for MeshDetector {
    fn modality(&self) -> Modality {
        self.cfg.modality
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>> {
        let Some((input, mapping)) = self.prepare(frame)? else {
            return Ok(Vec::new());
        };

        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .with_context(|| {
                format!("failed to run {} landmark session", self.cfg.modality.label())
            })?;

        if let Some(idx) = self.cfg.score_output {
            if idx >= outputs.len() {
                return Err(anyhow!(
                    "{} model returned {} outputs, score expected at {idx}",
                    self.cfg.modality.label(),
                    outputs.len()
                ));
            }
            let raw = outputs[idx]
                .try_extract_array::<f32>()?
                .iter()
                .next()
                .copied()
                .unwrap_or(0.0);
            let score = if self.cfg.score_is_logit { sigmoid(raw) } else { raw };
            if score < self.cfg.score_threshold {
                return Ok(Vec::new());
            }
        }

        if outputs.len() < 1 {
            return Err(anyhow!("{} model returned no outputs", self.cfg.modality.label()));
        }
        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks =
            common::decode_landmarks(&flattened, self.cfg.num_landmarks, self.cfg.stride)?;
        let projected = match &mapping {
            InputMapping::Letterbox(letterbox) => common::project_landmarks(&landmarks, letterbox),
            InputMapping::Crop(transform) => transform.project_all(&landmarks),
        };

        Ok(vec![common::normalize(&projected, frame.width, frame.height)])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn presets_pair_landmark_and_region_models() {
        let face = MeshModelConfig::face_mesh();
        assert_eq!(face.crop_style, CropStyle::Face);
        assert_eq!(face.region_layout.input_size, 128);

        let pose = MeshModelConfig::pose();
        assert_eq!(pose.crop_style, CropStyle::Body);
        assert_eq!(pose.region_layout.keypoints, 4);
    }

    #[test]
    fn crop_style_dispatches_by_modality() {
        let region = Region {
            bbox: [0.0, 0.0, 100.0, 100.0],
            landmarks: vec![(50.0, 80.0), (50.0, 20.0)],
            score: 0.9,
        };

        let (face_center, face_side, _) = CropStyle::Face.crop(&region, 1.5);
        assert_eq!(face_center, (50.0, 50.0));
        assert_relative_eq!(face_side, 150.0);

        let (body_center, body_side, body_angle) = CropStyle::Body.crop(&region, 1.25);
        assert_eq!(body_center, (50.0, 80.0));
        assert_relative_eq!(body_side, 150.0);
        assert_relative_eq!(body_angle, 0.0);
    }
}
