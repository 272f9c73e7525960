use std::time::Instant;

/// A packed RGB frame, row-major, 3 bytes per pixel.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgb: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// A frame filled with a single color.
    #[cfg(test)]
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            rgb.extend_from_slice(&color);
        }
        Self::new(rgb, width, height)
    }

    pub fn dims(&self) -> FrameDims {
        FrameDims {
            width: self.width,
            height: self.height,
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.rgb.get(idx..idx + 3).map(|px| [px[0], px[1], px[2]])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

/// A detector keypoint in normalized image coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An ordered landmark sequence as produced by one detection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Picks `indices` in the given order. Returns `None` if any index is missing.
    pub fn select(&self, indices: &[usize]) -> Option<Vec<Landmark>> {
        indices.iter().map(|&i| self.points.get(i).copied()).collect()
    }
}

impl From<Vec<(f32, f32)>> for LandmarkSet {
    fn from(points: Vec<(f32, f32)>) -> Self {
        Self::new(points.into_iter().map(|(x, y)| Landmark::new(x, y)).collect())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Modality {
    Face,
    Pose,
    Hand,
}

impl Modality {
    pub fn label(&self) -> &'static str {
        match self {
            Modality::Face => "face",
            Modality::Pose => "pose",
            Modality::Hand => "hand",
        }
    }
}
