use crate::types::{FrameDims, Landmark};

/// Pixel-space extrema of a landmark subset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl PixelBounds {
    pub fn width(&self) -> i64 {
        self.x_max - self.x_min
    }
}

pub fn to_pixel(landmark: Landmark, dims: FrameDims) -> (i64, i64) {
    let px = (landmark.x * dims.width as f32).round() as i64;
    let py = (landmark.y * dims.height as f32).round() as i64;
    (px, py)
}

/// Perimeter of the closed polygon traced by `points` in the given order.
///
/// Empty and single-point inputs yield 0.
pub fn circumference(points: &[Landmark], dims: FrameDims) -> f64 {
    let pixels: Vec<(i64, i64)> = points.iter().map(|&p| to_pixel(p, dims)).collect();
    let (Some(&first), Some(&last)) = (pixels.first(), pixels.last()) else {
        return 0.0;
    };

    let open: f64 = pixels.windows(2).map(|w| distance(w[0], w[1])).sum();
    open + distance(last, first)
}

pub fn pixel_bounds(points: &[Landmark], dims: FrameDims) -> Option<PixelBounds> {
    let mut pixels = points.iter().map(|&p| to_pixel(p, dims));
    let (x, y) = pixels.next()?;
    let init = PixelBounds {
        x_min: x,
        x_max: x,
        y_min: y,
        y_max: y,
    };
    Some(pixels.fold(init, |acc, (x, y)| PixelBounds {
        x_min: acc.x_min.min(x),
        x_max: acc.x_max.max(x),
        y_min: acc.y_min.min(y),
        y_max: acc.y_max.max(y),
    }))
}

fn distance(a: (i64, i64), b: (i64, i64)) -> f64 {
    let dx = (b.0 - a.0) as f64;
    let dy = (b.1 - a.1) as f64;
    dx.hypot(dy)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    const DIMS: FrameDims = FrameDims {
        width: 1000,
        height: 1000,
    };

    fn square() -> Vec<Landmark> {
        vec![
            Landmark::new(0.1, 0.1),
            Landmark::new(0.2, 0.1),
            Landmark::new(0.2, 0.2),
            Landmark::new(0.1, 0.2),
        ]
    }

    #[test]
    fn square_perimeter_from_every_start_vertex() {
        let points = square();
        for start in 0..points.len() {
            let mut rotated = points.clone();
            rotated.rotate_left(start);
            assert_abs_diff_eq!(circumference(&rotated, DIMS), 400.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn degenerate_inputs_are_zero() {
        assert_eq!(circumference(&[], DIMS), 0.0);
        assert_eq!(circumference(&[Landmark::new(0.37, 0.81)], DIMS), 0.0);
    }

    #[test]
    fn traversal_order_matters() {
        // Crossing the diagonals of the square turns it into a bow tie.
        let p = square();
        let bow_tie = vec![p[0], p[2], p[1], p[3]];
        let expected = 200.0 + 2.0 * (2.0f64).sqrt() * 100.0;
        assert_abs_diff_eq!(circumference(&bow_tie, DIMS), expected, epsilon = 1e-9);
    }

    #[test]
    fn pixels_use_current_frame_dims() {
        let dims = FrameDims {
            width: 640,
            height: 480,
        };
        assert_eq!(to_pixel(Landmark::new(0.65, 0.4), dims), (416, 192));
        assert_eq!(to_pixel(Landmark::new(1.0, 1.0), dims), (640, 480));
    }

    #[test]
    fn bounds_of_eye_corners() {
        let dims = FrameDims {
            width: 640,
            height: 480,
        };
        let eyes = [
            Landmark::new(0.3, 0.4),
            Landmark::new(0.35, 0.4),
            Landmark::new(0.6, 0.4),
            Landmark::new(0.65, 0.4),
        ];
        let bounds = pixel_bounds(&eyes, dims).unwrap();
        assert_eq!(
            bounds,
            PixelBounds {
                x_min: 192,
                x_max: 416,
                y_min: 192,
                y_max: 192,
            }
        );
        assert_eq!(bounds.width(), 224);
        assert!(pixel_bounds(&[], dims).is_none());
    }
}
