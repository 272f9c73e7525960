mod common;
mod hand;
mod mesh;
mod region;

pub use hand::HandDetector;
pub use mesh::{MeshDetector, MeshModelConfig};

use crate::types::{Frame, LandmarkSet, Modality};

/// Produces ordered, normalized landmark sets for one modality.
///
/// An empty result means nothing was detected on this frame.
pub trait LandmarkDetector {
    fn modality(&self) -> Modality;
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<LandmarkSet>>;
}
