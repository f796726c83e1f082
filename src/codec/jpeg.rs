//! JPEG encoding

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Quality used for every published JPEG
pub const JPEG_QUALITY: u8 = 85;

/// Largest edge a baseline JPEG header can describe
pub const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// Encode a frame at full resolution
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Bytes> {
    if frame.width() > MAX_JPEG_DIMENSION || frame.height() > MAX_JPEG_DIMENSION {
        return Err(Error::Encode(format!(
            "{}x{} exceeds the JPEG limit of {}",
            frame.width(),
            frame.height(),
            MAX_JPEG_DIMENSION
        )));
    }

    let rgb = frame.to_rgb()?;

    // Typical compression lands well under a tenth of the raw size
    let mut out = Vec::with_capacity(frame.as_bgr().len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(&rgb)?;

    Ok(Bytes::from(out))
}
