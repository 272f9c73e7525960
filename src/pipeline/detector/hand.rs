use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::{session::Session, value::Tensor};

use super::{
    LandmarkDetector,
    common::{self, load_session},
    region::{PALM_LAYOUT, RegionDetector, RegionDetectorConfig, crop_from_palm},
};
use crate::types::{Frame, LandmarkSet, Modality};

pub const INPUT_SIZE: u32 = 224;
pub const NUM_LANDMARKS: usize = 21;
const MIN_CONFIDENCE: f32 = 0.2;

/// Palm detection followed by 21-point hand landmark estimation per palm.
pub struct HandDetector {
    handpose: Session,
    palm_detector: RegionDetector,
    max_hands: usize,
}

impl HandDetector {
    pub fn new(handpose_model: &Path, palm_model: &Path, max_hands: usize) -> Result<Self> {
        let handpose = load_session(handpose_model)?;
        let palm_detector =
            RegionDetector::new(palm_model, RegionDetectorConfig::new(PALM_LAYOUT))?;

        log::info!(
            "hand detector ready using {} and palm detector {}",
            handpose_model.display(),
            palm_model.display()
        );

        Ok(Self {
            handpose,
            palm_detector,
            max_hands,
        })
    }

    fn estimate(
        &mut self,
        frame: &Frame,
        center: (f32, f32),
        side: f32,
        angle: f32,
    ) -> Result<Option<Vec<(f32, f32)>>> {
        let (input, transform) =
            common::prepare_rotated_crop(frame, center, side, angle, INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run hand landmark session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("hand landmark model returned no outputs"));
        }

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            1.0
        };
        if confidence < MIN_CONFIDENCE {
            return Ok(None);
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = common::decode_landmarks(&flattened, NUM_LANDMARKS, 3)?;

        Ok(Some(transform.project_all(&landmarks)))
    }
}

impl LandmarkDetector for HandDetector {
    fn modality(&self) -> Modality {
        Modality::Hand
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>> {
        let palms = self.palm_detector.detect(frame)?;

        let mut hands = Vec::new();
        for palm in palms.iter().take(self.max_hands) {
            let (center, side, angle) = crop_from_palm(palm);
            if let Some(points) = self.estimate(frame, center, side, angle)? {
                hands.push(common::normalize(&points, frame.width, frame.height));
            }
        }
        Ok(hands)
    }
}
