//! Frame and image types passed between pipeline stages.
//!
//! These are **internal** representations. The serialisable wire type is
//! [`crate::protocol::envelope::CompressedImageMsg`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

// ── PixelLayout ──────────────────────────────────────────────────

/// Channel layout of the grayscale pixel buffer handed to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// 1 byte per pixel: luminance.
    Luma8,
    /// 3 bytes per pixel: gray replicated to R, G, B.
    #[default]
    Rgb8,
    /// 4 bytes per pixel: gray replicated to R, G, B with opaque alpha.
    Rgba8,
}

impl PixelLayout {
    /// Bytes consumed by a single pixel in this layout.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Luma8 => 1,
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// Number of pixels in a `width x height` grid, rejecting empty or
/// overflowing dimensions.
pub(crate) fn pixel_count(width: u32, height: u32) -> Result<usize, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .ok_or(EncodeError::InvalidDimensions { width, height })
}

// ── DepthFrame ───────────────────────────────────────────────────

/// A row-major grid of normalized depth samples from one readback.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl DepthFrame {
    /// Wrap a flat sample array, checking it covers `width * height`.
    pub fn new(width: u32, height: u32, samples: Vec<f32>) -> Result<Self, EncodeError> {
        let expected = pixel_count(width, height)?;
        if samples.len() != expected {
            return Err(EncodeError::SampleCountMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// One row of samples.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[f32] {
        let start = y as usize * self.width as usize;
        &self.samples[start..start + self.width as usize]
    }

    /// Sample at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

// ── EncodedImage ─────────────────────────────────────────────────

/// A compressed image ready to be placed in a publish envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Compressed bytes.
    pub data: Bytes,
    /// Format tag carried in the `format` field on the wire, e.g. `"png"`.
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
