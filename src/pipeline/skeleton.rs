use crate::{
    geometry::to_pixel,
    types::{Frame, FrameDims, LandmarkSet},
};

pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

pub const POSE_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    (11, 23),
    (12, 24),
    (23, 24),
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

/// Face mesh silhouette, clockwise from the top of the forehead.
pub const FACE_OVAL: &[usize] = &[
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

#[rustfmt::skip]
pub const FACE_LIPS: &[(usize, usize)] = &[
    (61, 146), (146, 91), (91, 181), (181, 84), (84, 17), (17, 314), (314, 405), (405, 321),
    (321, 375), (375, 291), (61, 185), (185, 40), (40, 39), (39, 37), (37, 0), (0, 267),
    (267, 269), (269, 270), (270, 409), (409, 291), (78, 95), (95, 88), (88, 178), (178, 87),
    (87, 14), (14, 317), (317, 402), (402, 318), (318, 324), (324, 308), (78, 191), (191, 80),
    (80, 81), (81, 82), (82, 13), (13, 312), (312, 311), (311, 310), (310, 415), (415, 308),
];

/// Subject's left eye, which appears on the right of an unmirrored image.
#[rustfmt::skip]
pub const FACE_LEFT_EYE: &[(usize, usize)] = &[
    (263, 249), (249, 390), (390, 373), (373, 374), (374, 380), (380, 381), (381, 382), (382, 362),
    (263, 466), (466, 388), (388, 387), (387, 386), (386, 385), (385, 384), (384, 398), (398, 362),
];

#[rustfmt::skip]
pub const FACE_LEFT_EYEBROW: &[(usize, usize)] = &[
    (276, 283), (283, 282), (282, 295), (295, 285), (300, 293), (293, 334), (334, 296), (296, 336),
];

#[rustfmt::skip]
pub const FACE_RIGHT_EYE: &[(usize, usize)] = &[
    (33, 7), (7, 163), (163, 144), (144, 145), (145, 153), (153, 154), (154, 155), (155, 133),
    (33, 246), (246, 161), (161, 160), (160, 159), (159, 158), (158, 157), (157, 173), (173, 133),
];

#[rustfmt::skip]
pub const FACE_RIGHT_EYEBROW: &[(usize, usize)] = &[
    (46, 53), (53, 52), (52, 65), (65, 55), (70, 63), (63, 105), (105, 66), (66, 107),
];

/// Outer and inner corners of both eyes on the face mesh.
pub const EYE_CORNERS: &[usize] = &[33, 133, 362, 263];

/// Wrist, pinky, index and thumb keypoints of each hand on the pose skeleton.
pub const POSE_LEFT_HAND: &[usize] = &[15, 17, 19, 21];
pub const POSE_RIGHT_HAND: &[usize] = &[16, 18, 20, 22];

/// Thumb, index, middle, ring and pinky tips on the hand skeleton.
pub const FINGERTIPS: &[usize] = &[4, 8, 12, 16, 20];

pub const SKELETON_LINE_THICKNESS: i32 = 3;

#[derive(Clone, Copy, Debug)]
pub struct SkeletonStyle {
    pub line_color: [u8; 3],
    pub point_color: [u8; 3],
    pub thickness: i32,
    pub point_radius: i32,
}

pub const FACE_STYLE: SkeletonStyle = SkeletonStyle {
    line_color: [0, 255, 0],
    point_color: [0, 255, 0],
    thickness: 1,
    point_radius: 1,
};

pub const BODY_STYLE: SkeletonStyle = SkeletonStyle {
    line_color: [0, 255, 0],
    point_color: [255, 0, 0],
    thickness: SKELETON_LINE_THICKNESS,
    point_radius: 2,
};

/// Closes an index loop into consecutive connections.
pub fn loop_connections(indices: &[usize]) -> Vec<(usize, usize)> {
    indices
        .iter()
        .zip(indices.iter().cycle().skip(1))
        .map(|(&a, &b)| (a, b))
        .collect()
}

/// Face mesh contours: lips, eyes, eyebrows and the closed oval.
pub fn face_contours() -> Vec<(usize, usize)> {
    [FACE_LIPS, FACE_LEFT_EYE, FACE_LEFT_EYEBROW, FACE_RIGHT_EYE, FACE_RIGHT_EYEBROW]
        .into_iter()
        .flatten()
        .copied()
        .chain(loop_connections(FACE_OVAL))
        .collect()
}

/// Draws `connections` between landmarks of `set`, then a dot on every endpoint used.
pub fn draw_skeleton(
    frame: &mut Frame,
    set: &LandmarkSet,
    connections: &[(usize, usize)],
    style: SkeletonStyle,
) {
    let dims = frame.dims();
    let points = set.points();

    for &(a, b) in connections {
        if let (Some(&pa), Some(&pb)) = (points.get(a), points.get(b)) {
            draw_line(
                frame,
                to_pixel(pa, dims),
                to_pixel(pb, dims),
                style.line_color,
                style.thickness,
            );
        }
    }

    for &(a, b) in connections {
        for idx in [a, b] {
            if let Some(&p) = points.get(idx) {
                draw_circle(frame, to_pixel(p, dims), style.point_radius, style.point_color);
            }
        }
    }
}

fn draw_line(frame: &mut Frame, p0: (i64, i64), p1: (i64, i64), color: [u8; 3], thickness: i32) {
    let dims = frame.dims();
    let (Some((mut x0, mut y0)), Some((x1, y1))) = (clamp_point(p0), clamp_point(p1)) else {
        return;
    };
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        put_pixel_safe(frame, dims, x0, y0, color);
        if radius > 0 {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if (ox != 0 || oy != 0) && ox.abs() + oy.abs() <= radius {
                        put_pixel_safe(frame, dims, x0 + ox, y0 + oy, color);
                    }
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(frame: &mut Frame, center: (i64, i64), radius: i32, color: [u8; 3]) {
    let dims = frame.dims();
    let Some((cx, cy)) = clamp_point(center) else {
        return;
    };
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(frame, dims, cx + dx, cy + dy, color);
            }
        }
    }
}

// Landmarks far off-frame would make Bresenham walk forever.
fn clamp_point((x, y): (i64, i64)) -> Option<(i32, i32)> {
    const LIMIT: i64 = 1 << 16;
    if x.abs() > LIMIT || y.abs() > LIMIT {
        return None;
    }
    Some((x as i32, y as i32))
}

fn put_pixel_safe(frame: &mut Frame, dims: FrameDims, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= dims.width || uy >= dims.height {
        return;
    }
    let idx = (uy as usize * dims.width as usize + ux as usize) * 3;
    if let Some(px) = frame.rgb.get_mut(idx..idx + 3) {
        px.copy_from_slice(&color);
    }
}
