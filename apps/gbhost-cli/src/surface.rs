use std::{fs, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use gbhost_runtime::{FRAME_LEN, SCREEN_HEIGHT, SCREEN_WIDTH, VideoSurface};

/// Surface without a window. Keeps the last blitted frame so it can be
/// written out as a PNG at the current scale.
pub struct HeadlessSurface {
    pixels: Vec<u8>,
    scale: u8,
    presents: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; FRAME_LEN],
            scale: gbhost_runtime::frame::DEFAULT_SCALE,
            presents: 0,
        }
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Nearest-neighbour upscale of the last frame.
    fn scaled(&self) -> (u32, u32, Vec<u8>) {
        let s = usize::from(self.scale.max(1));
        let (w, h) = (SCREEN_WIDTH * s, SCREEN_HEIGHT * s);
        let mut out = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            let row = (y / s) * SCREEN_WIDTH;
            for x in 0..w {
                let i = (row + x / s) * 3;
                out.extend_from_slice(&self.pixels[i..i + 3]);
            }
        }
        (w as u32, h as u32, out)
    }

    pub fn write_png(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let (w, h, data) = self.scaled();
        let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), w, h);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
        Ok(())
    }
}

impl VideoSurface for HeadlessSurface {
    fn blit(&mut self, rgb: &[u8]) {
        self.pixels.copy_from_slice(rgb);
    }

    fn present(&mut self, scale: u8) {
        self.scale = scale;
        self.presents += 1;
    }
}
