use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_10X20},
    pixelcolor::Rgb888,
    prelude::*,
    text::Text,
};

use crate::types::Frame;

pub const LABEL_COLOR: [u8; 3] = [255, 255, 255];
const SHADOW_COLOR: [u8; 3] = [0, 0, 0];

/// Draws `text` with its baseline starting at `(x, y)`, with a one-pixel drop shadow.
pub fn draw_label(frame: &mut Frame, x: i32, y: i32, text: &str, color: [u8; 3]) {
    let mut target = FrameTarget(frame);
    let shadow = MonoTextStyle::new(&FONT_10X20, rgb(SHADOW_COLOR));
    let fill = MonoTextStyle::new(&FONT_10X20, rgb(color));

    let drawn = Text::new(text, Point::new(x + 1, y + 1), shadow)
        .draw(&mut target)
        .and_then(|_| Text::new(text, Point::new(x, y), fill).draw(&mut target));
    match drawn {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

pub fn circumference_label(subject: &str, value: f64) -> String {
    format!("{subject} Circumference: {} pixels", value as i64)
}

fn rgb([r, g, b]: [u8; 3]) -> Rgb888 {
    Rgb888::new(r, g, b)
}

struct FrameTarget<'a>(&'a mut Frame);

impl OriginDimensions for FrameTarget<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width, self.0.height)
    }
}

impl DrawTarget for FrameTarget<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.0.width, self.0.height);
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x >= width || y >= height {
                continue;
            }
            let idx = (y as usize * width as usize + x as usize) * 3;
            if let Some(px) = self.0.rgb.get_mut(idx..idx + 3) {
                px.copy_from_slice(&[color.r(), color.g(), color.b()]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_truncates_value() {
        assert_eq!(
            circumference_label("Face", 612.97),
            "Face Circumference: 612 pixels"
        );
    }

    #[test]
    fn label_draws_near_origin() {
        let mut frame = Frame::filled(120, 40, [50, 50, 50]);
        draw_label(&mut frame, 2, 25, "A", LABEL_COLOR);

        let changed = frame
            .rgb
            .chunks_exact(3)
            .filter(|px| *px != [50, 50, 50])
            .count();
        assert!(changed > 0);
        assert!(frame.rgb.chunks_exact(3).any(|px| px == LABEL_COLOR));
    }

    #[test]
    fn label_off_frame_is_clipped() {
        let mut frame = Frame::filled(8, 8, [0, 0, 0]);
        draw_label(&mut frame, 500, 500, "Clipped", LABEL_COLOR);
        assert!(frame.rgb.iter().all(|&v| v == 0));
    }
}
