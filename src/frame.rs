//! Raster frames
//!
//! A [`Frame`] is an immutable 8-bit, 3-channel raster in BGR order, as
//! delivered by the capture side. Sinks that transmit RGB convert on the
//! way out; the frame itself is never mutated after construction.

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::{Error, Result};

/// Channels per pixel
pub const CHANNELS: usize = 3;

/// An immutable BGR raster
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    /// Row-major BGR, no padding
    data: Bytes,
}

impl Frame {
    /// Wrap a BGR buffer
    ///
    /// The buffer must hold exactly `width * height * 3` bytes.
    pub fn from_bgr(width: u32, height: u32, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();

        if width == 0 || height == 0 {
            return Err(Error::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                width, height
            )));
        }

        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with one BGR colour
    pub fn solid(width: u32, height: u32, bgr: [u8; 3]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&bgr);
        }
        Self::from_bgr(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGR bytes
    pub fn as_bgr(&self) -> &[u8] {
        &self.data
    }

    /// Convert to an RGB image of the same size
    pub fn to_rgb(&self) -> Result<RgbImage> {
        let mut rgb = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(CHANNELS) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }

        RgbImage::from_raw(self.width, self.height, rgb).ok_or_else(|| {
            Error::InvalidFrame(format!(
                "buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }
}

/// Dimensions that fit `width x height` inside `max_width x max_height`
/// while preserving aspect ratio.
///
/// Only shrinks: a source already inside the bound is returned unchanged.
/// Integer arithmetic keeps the result exact up to truncation.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let (w, h) = (width as u64, height as u64);
    let (max_w, max_h) = (max_width as u64, max_height as u64);

    // Width is the binding constraint when max_w / w <= max_h / h
    let (new_w, new_h) = if max_w * h <= max_h * w {
        (max_w, h * max_w / w)
    } else {
        (w * max_h / h, max_h)
    };

    (new_w.max(1) as u32, new_h.max(1) as u32)
}

/// Resize an RGB image, returning it untouched when the size already matches
pub fn resize_rgb(image: RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    if image.width() == width && image.height() == height {
        return image;
    }
    imageops::resize(&image, width, height, filter)
}
