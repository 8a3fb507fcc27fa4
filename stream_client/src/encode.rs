//! Rasterization of captured frames into the wire format.
//!
use common::data_uri;
use image::{codecs::jpeg::JpegEncoder, RgbImage};

/// JPEG quality factor for outbound frames.
const JPEG_QUALITY: u8 = 80;

/// Encode a captured frame as a base64 JPEG data URI.
pub fn frame_to_data_uri(frame: &RgbImage) -> Result<String, image::ImageError> {
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder.encode_image(frame)?;
    Ok(data_uri::encode(data_uri::JPEG_MIME, &jpeg))
}
