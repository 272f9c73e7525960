use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use crate::{models::ModelKind, pipeline::LoopOptions, types::Modality};

/// Live camera mirror that tries glasses and nail decals on detected faces and hands.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Camera index to open.
    #[arg(long, default_value_t = 0)]
    pub camera: u32,
    /// Requested capture width; the camera may pick the closest it supports.
    #[arg(long, default_value_t = 640)]
    pub width: u32,
    #[arg(long, default_value_t = 480)]
    pub height: u32,
    /// Print available cameras and exit.
    #[arg(long)]
    pub list_cameras: bool,

    #[arg(long, default_value = "images/glasses.png")]
    pub glasses: PathBuf,
    #[arg(long, default_value = "images/nail.png")]
    pub nail: PathBuf,
    /// Glasses width relative to the span of the eye corners.
    #[arg(long, default_value_t = 1.2)]
    pub glasses_scale: f32,
    /// Nail decal size relative to its native size.
    #[arg(long, default_value_t = 0.5)]
    pub nail_scale: f32,

    #[arg(long, default_value_os_t = ModelKind::FaceMesh.default_path())]
    pub face_model: PathBuf,
    #[arg(long, default_value_os_t = ModelKind::FaceDetector.default_path())]
    pub face_detector_model: PathBuf,
    #[arg(long, default_value_os_t = ModelKind::Pose.default_path())]
    pub pose_model: PathBuf,
    #[arg(long, default_value_os_t = ModelKind::PoseDetector.default_path())]
    pub pose_detector_model: PathBuf,
    /// Run the face and pose landmark models on the whole frame, without a detector crop.
    #[arg(long)]
    pub full_frame: bool,
    #[arg(long, default_value_os_t = ModelKind::PalmDetector.default_path())]
    pub palm_model: PathBuf,
    #[arg(long, default_value_os_t = ModelKind::HandposeEstimator.default_path())]
    pub handpose_model: PathBuf,

    /// Detectors to run; repeat or comma separate. Defaults to all.
    #[arg(long = "modality", value_enum, value_delimiter = ',')]
    pub modalities: Vec<Modality>,
    #[arg(long, default_value_t = 2)]
    pub max_hands: usize,

    #[arg(long, default_value = "Try-on Mirror")]
    pub title: String,
    /// Hide the FPS line.
    #[arg(long)]
    pub no_fps: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        for (name, scale) in [
            ("--glasses-scale", self.glasses_scale),
            ("--nail-scale", self.nail_scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                bail!("{name} must be a finite positive number, got {scale}");
            }
        }
        if self.width == 0 || self.height == 0 {
            bail!("capture size must be non-zero, got {}x{}", self.width, self.height);
        }
        if self.max_hands == 0 {
            bail!("--max-hands must be at least 1");
        }
        Ok(())
    }

    /// Enabled modalities in processing order, without duplicates.
    pub fn enabled_modalities(&self) -> Vec<Modality> {
        [Modality::Face, Modality::Pose, Modality::Hand]
            .into_iter()
            .filter(|m| self.modalities.is_empty() || self.modalities.contains(m))
            .collect()
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            glasses_scale: self.glasses_scale,
            show_fps: !self.no_fps,
        }
    }
}
