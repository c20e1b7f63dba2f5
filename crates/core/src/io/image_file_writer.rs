use std::path::Path;

use crate::shared::pixel_buffer::PixelBuffer;

use super::image_io_error::{ensure_image_path, ImageIoError};

/// Saves a premultiplied RGBA8 [`PixelBuffer`] with straight alpha.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }

    /// Writes `pixels` to `path`, creating parent directories. The format
    /// follows the extension.
    pub fn write(&self, path: &Path, pixels: &PixelBuffer) -> Result<(), ImageIoError> {
        ensure_image_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut data = pixels.data().to_vec();
        for px in data.chunks_exact_mut(4) {
            unpremultiply(px);
        }
        let img = image::RgbaImage::from_raw(pixels.width(), pixels.height(), data).ok_or_else(
            || {
                ImageIoError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "pixel buffer does not match its dimensions",
                ))
            },
        )?;

        // JPEG and BMP encoders reject an alpha channel.
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if matches!(ext.as_str(), "jpg" | "jpeg" | "bmp") {
            image::DynamicImage::ImageRgba8(img).to_rgb8().save(path)?;
        } else {
            img.save(path)?;
        }
        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn unpremultiply(px: &mut [u8]) {
    let a = px[3] as u32;
    match a {
        255 => {}
        0 => px[..3].fill(0),
        _ => {
            for c in &mut px[..3] {
                *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
            }
        }
    }
}
