use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use thiserror::Error;

use super::{
    FrameSink, FrameSource, LandmarkDetector,
    annotate::{LABEL_COLOR, circumference_label, draw_label},
    skeleton::{
        BODY_STYLE, EYE_CORNERS, FACE_OVAL, FACE_STYLE, FINGERTIPS, HAND_CONNECTIONS,
        POSE_CONNECTIONS, POSE_LEFT_HAND, POSE_RIGHT_HAND, draw_skeleton, face_contours,
    },
};
use crate::{
    geometry::{circumference, to_pixel},
    overlay::{OverlayAsset, OverlayPlacement, Placement, composite},
    types::{Frame, FrameDims, LandmarkSet, Modality},
};

const FPS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    FrameFailed,
    UserQuit,
}

#[derive(Debug, Error)]
pub enum FrameFailure {
    #[error("frame acquisition failed")]
    Acquisition(#[source] anyhow::Error),
    #[error("frame size changed from {expected:?} to {actual:?}")]
    ResolutionChanged {
        expected: FrameDims,
        actual: FrameDims,
    },
    #[error("frame presentation failed")]
    Presentation(#[source] anyhow::Error),
}

#[derive(Debug)]
pub enum LoopExit {
    UserQuit,
    FrameFailed(FrameFailure),
}

/// Decals loaded at startup and borrowed by every frame.
pub struct OverlayAssets {
    pub glasses: OverlayAsset,
    /// Already at its on-screen size; fingertips place it unscaled.
    pub nail: OverlayAsset,
}

impl OverlayAssets {
    /// Scales the nail decal once so per-fingertip placement never resizes.
    pub fn new(glasses: OverlayAsset, nail: OverlayAsset, nail_scale: f32) -> Result<Self> {
        let width = (nail.width as f64 * nail_scale as f64).round() as u32;
        let height = (nail.height as f64 * nail_scale as f64).round() as u32;
        if width == 0 || height == 0 {
            bail!(
                "nail scale {nail_scale} shrinks the {}x{} decal to nothing",
                nail.width,
                nail.height
            );
        }

        let nail = nail.resized(width, height)?.into_owned();
        log::debug!("nail decal prepared at {width}x{height}");
        Ok(Self { glasses, nail })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LoopOptions {
    pub glasses_scale: f32,
    pub show_fps: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            glasses_scale: 1.2,
            show_fps: true,
        }
    }
}

/// What one iteration measured and drew.
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
    pub face_circumference: Option<f64>,
    pub left_hand_circumference: Option<f64>,
    pub right_hand_circumference: Option<f64>,
    pub overlays: Vec<OverlayPlacement>,
    pub detections: Vec<(Modality, usize)>,
}

pub enum Step {
    Continue(FrameReport),
    Exit(LoopExit),
}

/// Drives acquire → detect → composite → present → poll, one frame at a time.
pub struct FrameLoop<S: FrameSource, K: FrameSink> {
    source: S,
    sink: K,
    detectors: Vec<Box<dyn LandmarkDetector>>,
    assets: OverlayAssets,
    options: LoopOptions,
    face_contours: Vec<(usize, usize)>,
    session_dims: Option<FrameDims>,
    state: LoopState,
    fps: FpsCounter,
}

impl<S: FrameSource, K: FrameSink> FrameLoop<S, K> {
    pub fn new(
        source: S,
        sink: K,
        detectors: Vec<Box<dyn LandmarkDetector>>,
        assets: OverlayAssets,
        options: LoopOptions,
    ) -> Self {
        Self {
            source,
            sink,
            detectors,
            assets,
            options,
            face_contours: face_contours(),
            session_dims: None,
            state: LoopState::Running,
            fps: FpsCounter::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until the user quits or a frame fails, then releases the source.
    pub fn run(mut self) -> LoopExit {
        let exit = loop {
            match self.step() {
                Step::Continue(report) => log::trace!("frame report: {report:?}"),
                Step::Exit(exit) => break exit,
            }
        };
        self.source.release();
        log::debug!("frame loop finished in {:?}", self.state());

        match &exit {
            LoopExit::UserQuit => log::info!("quit requested, stopping"),
            LoopExit::FrameFailed(failure) => log::error!("stopping: {failure:#}"),
        }
        exit
    }

    pub fn step(&mut self) -> Step {
        if self.state != LoopState::Running {
            return Step::Exit(match self.state {
                LoopState::UserQuit => LoopExit::UserQuit,
                _ => LoopExit::FrameFailed(FrameFailure::Acquisition(anyhow::anyhow!(
                    "loop already stopped"
                ))),
            });
        }

        let mut frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => return self.fail(FrameFailure::Acquisition(err)),
        };

        let dims = frame.dims();
        match self.session_dims {
            None => {
                log::info!("session resolution {}x{}", dims.width, dims.height);
                self.session_dims = Some(dims);
            }
            Some(expected) if expected != dims => {
                return self.fail(FrameFailure::ResolutionChanged {
                    expected,
                    actual: dims,
                });
            }
            Some(_) => {}
        }

        let report = self.process(&mut frame);
        log::trace!("frame processed in {:?}", frame.timestamp.elapsed());

        if let Some(fps) = self.fps.tick() {
            log::debug!("{fps:.1} fps");
        }
        if self.options.show_fps {
            let y = frame.height as i32 - 10;
            draw_label(&mut frame, 10, y, self.fps.text(), LABEL_COLOR);
        }

        if let Err(err) = self.sink.present(&frame) {
            return self.fail(FrameFailure::Presentation(err));
        }

        if self.sink.quit_requested() {
            self.state = LoopState::UserQuit;
            return Step::Exit(LoopExit::UserQuit);
        }

        Step::Continue(report)
    }

    fn fail(&mut self, failure: FrameFailure) -> Step {
        self.state = LoopState::FrameFailed;
        Step::Exit(LoopExit::FrameFailed(failure))
    }

    fn process(&mut self, frame: &mut Frame) -> FrameReport {
        // Every detector sees the untouched frame.
        let mut detections = Vec::with_capacity(self.detectors.len());
        for detector in &mut self.detectors {
            let modality = detector.modality();
            match detector.detect(frame) {
                Ok(sets) if !sets.is_empty() => detections.push((modality, sets)),
                Ok(_) => {}
                Err(err) => log::warn!("{} detection failed: {err:?}", modality.label()),
            }
        }

        let mut report = FrameReport::default();
        for (modality, sets) in &detections {
            report.detections.push((*modality, sets.len()));
            match modality {
                Modality::Face => self.apply_face(frame, sets, &mut report),
                Modality::Pose => self.apply_pose(frame, sets, &mut report),
                Modality::Hand => self.apply_hands(frame, sets, &mut report),
            }
        }

        let labels = [
            ("Face", report.face_circumference, 30),
            ("Left Hand", report.left_hand_circumference, 60),
            ("Right Hand", report.right_hand_circumference, 90),
        ];
        for (subject, value, y) in labels {
            if let Some(value) = value {
                log::debug!("{subject} circumference {value:.1}px");
                draw_label(frame, 10, y, &circumference_label(subject, value), LABEL_COLOR);
            }
        }

        report
    }

    fn apply_face(&self, frame: &mut Frame, faces: &[LandmarkSet], report: &mut FrameReport) {
        let dims = frame.dims();
        for face in faces {
            draw_skeleton(frame, face, &self.face_contours, FACE_STYLE);

            if let Some(outline) = face.select(FACE_OVAL) {
                report.face_circumference = Some(circumference(&outline, dims));
            }

            if let Some(eyes) = face.select(EYE_CORNERS) {
                let placement = Placement::BoundingBoxFitted {
                    landmarks: &eyes,
                    scale: self.options.glasses_scale,
                };
                self.place(frame, &self.assets.glasses, &placement, report);
            }
        }
    }

    fn apply_pose(&self, frame: &mut Frame, poses: &[LandmarkSet], report: &mut FrameReport) {
        let dims = frame.dims();
        for pose in poses {
            draw_skeleton(frame, pose, POSE_CONNECTIONS, BODY_STYLE);

            if let Some(left) = pose.select(POSE_LEFT_HAND) {
                report.left_hand_circumference = Some(circumference(&left, dims));
            }
            if let Some(right) = pose.select(POSE_RIGHT_HAND) {
                report.right_hand_circumference = Some(circumference(&right, dims));
            }
        }
    }

    fn apply_hands(&self, frame: &mut Frame, hands: &[LandmarkSet], report: &mut FrameReport) {
        let dims = frame.dims();
        for hand in hands {
            draw_skeleton(frame, hand, HAND_CONNECTIONS, BODY_STYLE);

            for &tip in FINGERTIPS {
                let Some(&landmark) = hand.points().get(tip) else {
                    continue;
                };
                let (x, y) = to_pixel(landmark, dims);
                let placement = Placement::AnchorCentered { x, y, scale: 1.0 };
                self.place(frame, &self.assets.nail, &placement, report);
            }
        }
    }

    fn place(
        &self,
        frame: &mut Frame,
        asset: &OverlayAsset,
        placement: &Placement<'_>,
        report: &mut FrameReport,
    ) {
        match composite(frame, asset, placement) {
            Ok(Some(placed)) => report.overlays.push(placed),
            Ok(None) => {}
            Err(err) => log::warn!("overlay skipped: {err:?}"),
        }
    }
}

struct FpsCounter {
    window_start: Instant,
    frames: u32,
    text: String,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            text: String::from("FPS: --"),
        }
    }

    /// Counts a frame; returns the rate once per interval.
    fn tick(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed < FPS_INTERVAL {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.text = format!("FPS: {fps:.1}");
        self.frames = 0;
        self.window_start = Instant::now();
        Some(fps)
    }

    fn text(&self) -> &str {
        &self.text
    }
}
