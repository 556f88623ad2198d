//! Image encoding: `RgbImage` → base64 JPEG for the vision request.
//!
//! Scans of ID cards are photographs, not typeset text, so JPEG at quality 90
//! keeps them readable at a fraction of the PNG size, which matters for
//! local model servers with small request-size limits.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::debug;

/// Encode a page as base64 JPEG at the given quality (1–100).
pub fn encode_jpeg_base64(img: &RgbImage, quality: u8) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(img)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());
    Ok(b64)
}

/// Wrap base64 JPEG data in a `data:` URI.
pub fn jpeg_data_uri(b64: &str) -> String {
    format!("data:image/jpeg;base64,{b64}")
}
