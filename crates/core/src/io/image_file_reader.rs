use std::path::Path;

use crate::shared::pixel_buffer::PixelBuffer;

use super::image_io_error::{ensure_image_path, ImageIoError};

/// Loads an image file as a premultiplied RGBA8 [`PixelBuffer`].
///
/// Files without alpha load fully opaque.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path) -> Result<PixelBuffer, ImageIoError> {
        ensure_image_path(path)?;
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        let mut data = img.into_raw();
        for px in data.chunks_exact_mut(4) {
            premultiply(px);
        }
        log::debug!("Loaded {} ({width}x{height})", path.display());
        Ok(PixelBuffer::new(data, width, height))
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

fn premultiply(px: &mut [u8]) {
    let a = px[3] as u32;
    if a == 255 {
        return;
    }
    for c in &mut px[..3] {
        *c = ((*c as u32 * a + 127) / 255) as u8;
    }
}
