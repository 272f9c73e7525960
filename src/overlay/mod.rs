mod asset;
mod blend;
mod placement;

pub use asset::OverlayAsset;
pub use placement::{OverlayPlacement, PixelRect, blend_at, fit_to_landmarks};

use anyhow::Result;

use crate::types::{Frame, Landmark};

/// How an overlay is positioned on the frame.
#[derive(Clone, Copy, Debug)]
pub enum Placement<'a> {
    /// Centered on a single pixel, e.g. a fingertip.
    AnchorCentered { x: i64, y: i64, scale: f32 },
    /// Spanning the horizontal extent of a landmark subset, e.g. both eyes.
    BoundingBoxFitted {
        landmarks: &'a [Landmark],
        scale: f32,
    },
}

/// Blends `overlay` onto `frame` using `placement`. `Ok(None)` means nothing was written.
pub fn composite(
    frame: &mut Frame,
    overlay: &OverlayAsset,
    placement: &Placement<'_>,
) -> Result<Option<OverlayPlacement>> {
    match *placement {
        Placement::AnchorCentered { x, y, scale } => blend_at(frame, overlay, x, y, scale),
        Placement::BoundingBoxFitted { landmarks, scale } => {
            fit_to_landmarks(frame, overlay, landmarks, scale)
        }
    }
}
