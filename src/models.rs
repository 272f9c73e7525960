use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    FaceDetector,
    FaceMesh,
    PoseDetector,
    Pose,
    PalmDetector,
    HandposeEstimator,
}

const FACE_DETECTOR_MODEL_FILENAME: &str = "face_detection_short_range.onnx";
const POSE_DETECTOR_MODEL_FILENAME: &str = "pose_detection.onnx";
const FACE_MESH_MODEL_FILENAME: &str = "face_landmark.onnx";
const POSE_MODEL_FILENAME: &str = "pose_landmark.onnx";
const PALM_DETECTOR_MODEL_FILENAME: &str = "palm_detection_mediapipe_2023feb.onnx";
const HANDPOSE_ESTIMATOR_MODEL_FILENAME: &str = "handpose_estimation_mediapipe_2023feb.onnx";

impl ModelKind {
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::FaceDetector => "face detector",
            ModelKind::FaceMesh => "face mesh",
            ModelKind::PoseDetector => "pose detector",
            ModelKind::Pose => "pose landmark",
            ModelKind::PalmDetector => "palm detector",
            ModelKind::HandposeEstimator => "handpose estimator",
        }
    }

    fn filename(self) -> &'static str {
        match self {
            ModelKind::FaceDetector => FACE_DETECTOR_MODEL_FILENAME,
            ModelKind::FaceMesh => FACE_MESH_MODEL_FILENAME,
            ModelKind::PoseDetector => POSE_DETECTOR_MODEL_FILENAME,
            ModelKind::Pose => POSE_MODEL_FILENAME,
            ModelKind::PalmDetector => PALM_DETECTOR_MODEL_FILENAME,
            ModelKind::HandposeEstimator => HANDPOSE_ESTIMATOR_MODEL_FILENAME,
        }
    }

    pub fn default_path(self) -> PathBuf {
        PathBuf::from("models").join(self.filename())
    }
}

/// Fails unless `model_path` is a readable, non-empty file.
pub fn ensure_model_present(model_path: &Path, model: ModelKind) -> anyhow::Result<()> {
    let metadata = std::fs::metadata(model_path).with_context(|| {
        format!(
            "{} model not found at {}",
            model.label(),
            model_path.display()
        )
    })?;

    if !metadata.is_file() {
        bail!(
            "{} model path {} is not a file",
            model.label(),
            model_path.display()
        );
    }
    if metadata.len() == 0 {
        bail!(
            "{} model at {} is empty",
            model.label(),
            model_path.display()
        );
    }

    log::info!(
        "{} model ready at {} ({} bytes)",
        model.label(),
        model_path.display(),
        metadata.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tryon-models-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_paths_live_under_models() {
        assert_eq!(
            ModelKind::PalmDetector.default_path(),
            Path::new("models/palm_detection_mediapipe_2023feb.onnx")
        );
        assert!(ModelKind::FaceMesh.default_path().starts_with("models"));
    }

    #[test]
    fn missing_model_is_reported() {
        let dir = scratch_dir("missing");
        let err = ensure_model_present(&dir.join("nope.onnx"), ModelKind::Pose).unwrap_err();
        assert!(err.to_string().contains("pose landmark model not found"));
    }

    #[test]
    fn empty_and_directory_paths_are_rejected() {
        let dir = scratch_dir("empty");
        let empty = dir.join("empty.onnx");
        fs::write(&empty, b"").unwrap();

        assert!(ensure_model_present(&empty, ModelKind::FaceMesh).is_err());
        assert!(ensure_model_present(&dir, ModelKind::FaceMesh).is_err());
    }

    #[test]
    fn present_model_passes() {
        let dir = scratch_dir("present");
        let model = dir.join("model.onnx");
        fs::write(&model, b"onnx").unwrap();
        assert!(ensure_model_present(&model, ModelKind::HandposeEstimator).is_ok());
    }
}
