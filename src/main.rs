mod config;
mod geometry;
mod models;
mod overlay;
mod pipeline;
mod types;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use config::Args;
use models::{ModelKind, ensure_model_present};
use overlay::OverlayAsset;
use pipeline::{
    HandDetector, LandmarkDetector, MeshDetector, MeshModelConfig, OverlayAssets,
};
use types::Modality;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    args.validate()?;

    if args.list_cameras {
        return list_cameras();
    }

    let assets = OverlayAssets::new(
        OverlayAsset::load(&args.glasses)?,
        OverlayAsset::load(&args.nail)?,
        args.nail_scale,
    )?;
    let detectors = build_detectors(&args)?;

    run(&args, detectors, assets)
}

fn build_detectors(args: &Args) -> Result<Vec<Box<dyn LandmarkDetector>>> {
    let mut detectors: Vec<Box<dyn LandmarkDetector>> = Vec::new();

    for modality in args.enabled_modalities() {
        match modality {
            Modality::Face => detectors.push(Box::new(mesh_detector(
                args,
                (args.face_model.as_path(), ModelKind::FaceMesh),
                (args.face_detector_model.as_path(), ModelKind::FaceDetector),
                MeshModelConfig::face_mesh(),
            )?)),
            Modality::Pose => detectors.push(Box::new(mesh_detector(
                args,
                (args.pose_model.as_path(), ModelKind::Pose),
                (args.pose_detector_model.as_path(), ModelKind::PoseDetector),
                MeshModelConfig::pose(),
            )?)),
            Modality::Hand => {
                ensure_model_present(&args.palm_model, ModelKind::PalmDetector)?;
                ensure_model_present(&args.handpose_model, ModelKind::HandposeEstimator)?;
                detectors.push(Box::new(HandDetector::new(
                    &args.handpose_model,
                    &args.palm_model,
                    args.max_hands,
                )?));
            }
        }
    }

    let enabled: Vec<&str> = detectors.iter().map(|d| d.modality().label()).collect();
    log::info!("detectors enabled: {}", enabled.join(", "));
    Ok(detectors)
}

fn mesh_detector(
    args: &Args,
    (landmark_model, landmark_kind): (&Path, ModelKind),
    (region_model, region_kind): (&Path, ModelKind),
    cfg: MeshModelConfig,
) -> Result<MeshDetector> {
    ensure_model_present(landmark_model, landmark_kind)?;
    let detector = MeshDetector::new(landmark_model, cfg)?;
    if args.full_frame {
        return Ok(detector);
    }

    ensure_model_present(region_model, region_kind)?;
    detector.with_region_detector(region_model)
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = pipeline::available_cameras().context("failed to query cameras")?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for camera in cameras {
        println!("{}: {}", camera.index, camera.label);
    }
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn run(args: &Args, detectors: Vec<Box<dyn LandmarkDetector>>, assets: OverlayAssets) -> Result<()> {
    use pipeline::{CameraSource, FrameLoop, LoopExit, WindowSink};

    let source = CameraSource::open(args.camera, args.width, args.height)?;
    let sink = WindowSink::new(&args.title, args.width, args.height)
        .context("failed to open display window")?;

    match FrameLoop::new(source, sink, detectors, assets, args.loop_options()).run() {
        LoopExit::UserQuit => Ok(()),
        LoopExit::FrameFailed(failure) => Err(failure.into()),
    }
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("built without camera support; enable the `camera-nokhwa` feature")
}

#[cfg(not(feature = "camera-nokhwa"))]
fn run(_args: &Args, _detectors: Vec<Box<dyn LandmarkDetector>>, _assets: OverlayAssets) -> Result<()> {
    anyhow::bail!("built without camera support; enable the `camera-nokhwa` feature")
}
