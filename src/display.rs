//! Preview window.
//!
//! minifb wants 0RGB u32 pixels, so each presented RGB frame is packed into
//! a reused buffer before the update call.

use anyhow::{ensure, Result};
use minifb::{Window, WindowOptions};

const TARGET_FPS: usize = 60;

pub struct DisplayWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl DisplayWindow {
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let (width, height) = (width as usize, height as usize);
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;
        window.set_target_fps(TARGET_FPS);

        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// Present one tightly-packed RGB frame of the window's native size.
    pub fn present(&mut self, rgb: &[u8]) -> Result<()> {
        ensure!(
            rgb.len() == self.width * self.height * 3,
            "frame size mismatch: got {} bytes for {}x{}",
            rgb.len(),
            self.width,
            self.height
        );
        for (dst, src) in self.buffer.iter_mut().zip(rgb.chunks_exact(3)) {
            *dst = (src[0] as u32) << 16 | (src[1] as u32) << 8 | src[2] as u32;
        }
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }
}
