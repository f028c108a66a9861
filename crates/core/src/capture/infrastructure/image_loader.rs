use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("unsupported image type: {0}")]
    UnsupportedExtension(PathBuf),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decodes a still image from disk into an RGB frame.
pub fn load_image(path: &Path) -> Result<Frame, ImageLoadError> {
    if !is_supported_image(path) {
        return Err(ImageLoadError::UnsupportedExtension(path.to_path_buf()));
    }
    let img = image::open(path).map_err(|source| ImageLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(Frame::from_rgb(img.to_rgb8(), 0))
}
