pub mod annotate;
#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod detector;
pub mod display;
pub mod frame_loop;
#[cfg(feature = "camera-nokhwa")]
pub mod rgb_converter;
pub mod skeleton;

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraSource, available_cameras};
pub use detector::{HandDetector, LandmarkDetector, MeshDetector, MeshModelConfig};
pub use display::WindowSink;
pub use frame_loop::{FrameLoop, LoopExit, LoopOptions, OverlayAssets};

use crate::types::Frame;

/// Where frames come from. Acquisition errors end the session.
pub trait FrameSource {
    fn next_frame(&mut self) -> anyhow::Result<Frame>;
    /// Gives the device back. Must be safe to call more than once.
    fn release(&mut self);
}

/// Where finished frames go, and where the user asks to stop.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame) -> anyhow::Result<()>;
    /// Non-blocking.
    fn quit_requested(&mut self) -> bool;
}
