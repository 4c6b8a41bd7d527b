//! Image decoding.

use peniko::{Blob, ImageAlphaType, ImageData, ImageFormat};
use std::sync::Arc;
use thiserror::Error;

/// Errors producing displayable image data.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// Decode encoded image bytes (PNG, JPEG, WebP) into RGBA8 image data.
pub fn decode_image(bytes: &[u8]) -> Result<ImageData, RenderError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::Empty { width, height });
    }
    log::debug!("Decoded {}x{} image ({} bytes)", width, height, bytes.len());

    Ok(ImageData {
        data: Blob::new(Arc::new(rgba.into_vec())),
        format: ImageFormat::Rgba8,
        width,
        height,
        alpha_type: ImageAlphaType::Alpha,
    })
}
