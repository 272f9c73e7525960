use anyhow::{Context, Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};

use super::{FrameSource, rgb_converter};
use crate::types::Frame;

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

const TARGET_FPS: u32 = 30;
/// Consecutive undecodable frames tolerated before the stream counts as broken.
const MAX_UNDECODABLE_FRAMES: usize = 5;

fn requested_formats(width: u32, height: u32) -> [RequestedFormat<'static>; 4] {
    let closest = CameraFormat::new(Resolution::new(width, height), FrameFormat::YUYV, TARGET_FPS);
    [
        RequestedFormat::with_formats(
            RequestedFormatType::Closest(closest),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Fall back to any format Nokhwa can decode, but prefer higher FPS to
        // avoid very low default rates (e.g. 15 FPS) that some drivers reject.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    format!("{} ({})", info.human_name(), info.description())
}

fn build_camera(index: CameraIndex, width: u32, height: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(width, height) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Reads frames until one decodes. Read errors end the attempt at once; decode errors are
/// logged and skipped up to [`MAX_UNDECODABLE_FRAMES`] times in a row.
fn read_decodable<B, T>(
    mut read: impl FnMut() -> Result<B>,
    mut decode: impl FnMut(&B) -> Result<T>,
) -> Result<T> {
    let mut last_err = None;
    for _ in 0..MAX_UNDECODABLE_FRAMES {
        let raw = read()?;
        match decode(&raw) {
            Ok(decoded) => return Ok(decoded),
            Err(err) => {
                log::warn!("failed to decode camera frame {err:?}");
                last_err = Some(err);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| anyhow!("no camera frame decoded"));
    Err(err.context(format!(
        "{MAX_UNDECODABLE_FRAMES} consecutive camera frames failed to decode"
    )))
}

/// An open camera stream, read synchronously from the frame loop.
///
/// The stream is stopped by [`FrameSource::release`] or, failing that, on drop.
pub struct CameraSource {
    camera: Option<Camera>,
}

impl CameraSource {
    pub fn open(index: u32, width: u32, height: u32) -> Result<Self> {
        let camera = build_camera(CameraIndex::Index(index), width, height)
            .with_context(|| format!("failed to open camera {index}"))?;

        let format = camera.camera_format();
        log::info!(
            "camera {index} streaming {}x{} {:?} @ {} fps",
            format.resolution().width(),
            format.resolution().height(),
            format.format(),
            format.frame_rate()
        );

        Ok(Self {
            camera: Some(camera),
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| anyhow!("camera already released"))?;

        let converted = read_decodable(
            || camera.frame().context("camera frame read failed"),
            rgb_converter::convert_camera_frame,
        )?;

        Ok(Frame::new(converted.rgb, converted.width, converted.height))
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err:?}");
            }
            log::info!("camera released");
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    fn decode(raw: &Option<u8>) -> Result<u8> {
        raw.ok_or_else(|| anyhow!("corrupt jpeg"))
    }

    #[test]
    fn corrupt_frame_is_skipped() {
        let mut frames = VecDeque::from([None, Some(7), Some(9)]);
        let got = read_decodable(
            || frames.pop_front().ok_or_else(|| anyhow!("stream ended")),
            decode,
        )
        .unwrap();

        assert_eq!(got, 7);
        assert_eq!(frames, VecDeque::from([Some(9)]));
    }

    #[test]
    fn persistent_corruption_gives_up() {
        let mut reads = 0;
        let err = read_decodable(
            || {
                reads += 1;
                Ok(None)
            },
            decode,
        )
        .unwrap_err();

        assert_eq!(reads, MAX_UNDECODABLE_FRAMES);
        assert!(format!("{err:#}").contains("corrupt jpeg"));
    }

    #[test]
    fn read_failure_is_not_retried() {
        let mut reads = 0;
        let result: Result<u8> = read_decodable(
            || {
                reads += 1;
                Err(anyhow!("device unplugged"))
            },
            decode,
        );

        assert!(result.is_err());
        assert_eq!(reads, 1);
    }

    #[test]
    fn closest_request_comes_first() {
        let formats = requested_formats(640, 480);
        assert!(matches!(
            formats[0].requested_format_type(),
            RequestedFormatType::Closest(_)
        ));
    }
}
