use anyhow::{Result, anyhow};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use super::FrameSink;
use crate::types::Frame;

/// A native window showing each presented frame. `q`, `Esc` or closing the window quits.
pub struct WindowSink {
    window: Window,
    buffer: Vec<u32>,
}

impl WindowSink {
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )
        .map_err(|err| anyhow!("failed to create window: {err}"))?;

        Ok(Self {
            window,
            buffer: Vec::with_capacity(width as usize * height as usize),
        })
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        pack_0rgb(&frame.rgb, &mut self.buffer);
        self.window
            .update_with_buffer(&self.buffer, frame.width as usize, frame.height as usize)
            .map_err(|err| anyhow!("window update failed: {err}"))
    }

    fn quit_requested(&mut self) -> bool {
        !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_pressed(Key::Q, KeyRepeat::No)
    }
}

/// Packs RGB bytes into the `0x00RRGGBB` words minifb expects.
fn pack_0rgb(rgb: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        rgb.chunks_exact(3)
            .map(|px| ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_rgb_words() {
        let mut out = vec![7];
        pack_0rgb(&[0x12, 0x34, 0x56, 0xff, 0x00, 0x01], &mut out);
        assert_eq!(out, vec![0x0012_3456, 0x00ff_0001]);
    }
}
