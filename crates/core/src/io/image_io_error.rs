use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::IMAGE_EXTENSIONS;

#[derive(Error, Debug)]
pub enum ImageIoError {
    #[error("unsupported image format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `path` has one of the supported image extensions.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub(crate) fn ensure_image_path(path: &Path) -> Result<(), ImageIoError> {
    if is_image(path) {
        Ok(())
    } else {
        Err(ImageIoError::UnsupportedFormat(path.to_path_buf()))
    }
}
