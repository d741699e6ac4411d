use std::sync::Arc;

use base64::Engine as _;
use image::ImageEncoder as _;
use image::codecs::jpeg::JpegEncoder;

use crate::foundation::core::{Canvas, HexColor};
use crate::foundation::error::{DyelotError, DyelotResult};
use crate::render::surface::Surface;

/// MIME type of every [`EncodedImage`].
pub const JPEG_MIME: &str = "image/jpeg";

/// Displayable, lossy-compressed render output.
///
/// Cloning shares the underlying bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    pixel_size: Canvas,
    logical_size: Canvas,
}

impl EncodedImage {
    /// Encoded byte stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Always [`JPEG_MIME`].
    pub fn mime(&self) -> &'static str {
        JPEG_MIME
    }

    /// Size of the encoded raster (logical size times the pixel density factor).
    pub fn pixel_size(&self) -> Canvas {
        self.pixel_size
    }

    /// Size the host should present the image at.
    pub fn logical_size(&self) -> Canvas {
        self.logical_size
    }

    /// `data:` URI suitable for an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            JPEG_MIME,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Flatten `surface` over `matte` and encode it as a baseline JPEG.
pub fn encode_jpeg(
    surface: &Surface,
    matte: HexColor,
    quality: u8,
    logical_size: Canvas,
) -> DyelotResult<EncodedImage> {
    if !(1..=100).contains(&quality) {
        return Err(DyelotError::validation("jpeg quality must be in 1..=100"));
    }
    let rgb = surface.to_rgb8(matte);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(
            &rgb,
            surface.width(),
            surface.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| DyelotError::render(format!("jpeg encode: {e}")))?;

    Ok(EncodedImage {
        bytes: Arc::from(buf),
        pixel_size: surface.size(),
        logical_size,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/encode.rs"]
mod tests;
