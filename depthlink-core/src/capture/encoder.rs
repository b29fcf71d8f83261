//! Depth-to-grayscale encoder with a pluggable image codec.
//!
//! Encoding is split in two steps so each can be tested on its own:
//!
//! - **Mapping**: every normalized sample `d` becomes
//!   `clamp(round(d * 255), 0, 255)`, replicated into the configured
//!   [`PixelLayout`]. Pure, no codec involved.
//! - **Compression**: the pixel buffer is handed to an [`ImageCodec`]
//!   (PNG by default) which returns the compressed bytes.
//!
//! The encoder holds no mutable state, so one instance can be shared
//! across blocking workers.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use crate::capture::types::{DepthFrame, EncodedImage, PixelLayout, pixel_count};
use crate::error::EncodeError;

// ── ImageCodec ───────────────────────────────────────────────────

/// Black-box compression of a tightly packed pixel buffer.
pub trait ImageCodec: Send + Sync {
    /// Format tag written into the envelope's `format` field.
    fn format(&self) -> &'static str;

    /// Compress `pixels` (`width * height * layout.bytes_per_pixel()` bytes).
    fn compress(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Vec<u8>, EncodeError>;
}

// ── PngCodec ─────────────────────────────────────────────────────

/// PNG compression effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PngCompression {
    Fast,
    #[default]
    Default,
    Best,
}

impl From<PngCompression> for CompressionType {
    fn from(c: PngCompression) -> Self {
        match c {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

/// Lossless PNG codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec {
    compression: PngCompression,
}

impl PngCodec {
    pub fn new(compression: PngCompression) -> Self {
        Self { compression }
    }
}

impl ImageCodec for PngCodec {
    fn format(&self) -> &'static str {
        "png"
    }

    fn compress(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Vec<u8>, EncodeError> {
        let color = match layout {
            PixelLayout::Luma8 => ExtendedColorType::L8,
            PixelLayout::Rgb8 => ExtendedColorType::Rgb8,
            PixelLayout::Rgba8 => ExtendedColorType::Rgba8,
        };

        let mut out = Cursor::new(Vec::with_capacity(pixels.len() / 4));
        PngEncoder::new_with_quality(&mut out, self.compression.into(), FilterType::Adaptive)
            .write_image(pixels, width, height, color)?;
        Ok(out.into_inner())
    }
}

// ── DepthEncoder ─────────────────────────────────────────────────

/// Converts normalized depth samples into a compressed grayscale image.
pub struct DepthEncoder {
    codec: Box<dyn ImageCodec>,
    layout: PixelLayout,
    flip_vertical: bool,
}

impl Default for DepthEncoder {
    fn default() -> Self {
        Self::png(PngCompression::Default)
    }
}

impl std::fmt::Debug for DepthEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthEncoder")
            .field("format", &self.codec.format())
            .field("layout", &self.layout)
            .field("flip_vertical", &self.flip_vertical)
            .finish()
    }
}

impl DepthEncoder {
    /// PNG encoder producing RGB pixels.
    pub fn png(compression: PngCompression) -> Self {
        Self::with_codec(PngCodec::new(compression))
    }

    /// Encoder using an arbitrary codec.
    pub fn with_codec(codec: impl ImageCodec + 'static) -> Self {
        Self {
            codec: Box::new(codec),
            layout: PixelLayout::default(),
            flip_vertical: false,
        }
    }

    /// Set the channel layout handed to the codec.
    pub fn with_layout(mut self, layout: PixelLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Emit rows last-to-first. Render-side buffers are stored bottom-up,
    /// so `true` matches the row order of a Unity `Texture2D` export
    /// (y = 0 at the bottom). The default `false` writes the sample array
    /// top-down as given.
    pub fn with_flip_vertical(mut self, flip: bool) -> Self {
        self.flip_vertical = flip;
        self
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn format(&self) -> &'static str {
        self.codec.format()
    }

    /// Encode a flat sample array of exactly `width * height` entries.
    pub fn encode(
        &self,
        samples: &[f32],
        width: u32,
        height: u32,
    ) -> Result<EncodedImage, EncodeError> {
        let pixels = self.gray_pixels(samples, width, height)?;
        let data = self.codec.compress(&pixels, width, height, self.layout)?;

        Ok(EncodedImage {
            data: Bytes::from(data),
            format: self.codec.format(),
            width,
            height,
        })
    }

    /// Encode a validated frame.
    pub fn encode_frame(&self, frame: &DepthFrame) -> Result<EncodedImage, EncodeError> {
        self.encode(frame.samples(), frame.width(), frame.height())
    }

    /// Map samples to a packed pixel buffer in the configured layout.
    pub fn gray_pixels(
        &self,
        samples: &[f32],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, EncodeError> {
        let expected = pixel_count(width, height)?;
        if samples.len() != expected {
            return Err(EncodeError::SampleCountMismatch {
                expected,
                actual: samples.len(),
            });
        }

        let bpp = self.layout.bytes_per_pixel();
        let mut out = Vec::with_capacity(expected * bpp);
        let width = width as usize;

        let mut push_row = |row: &[f32]| {
            for &d in row {
                let g = depth_to_gray(d);
                match self.layout {
                    PixelLayout::Luma8 => out.push(g),
                    PixelLayout::Rgb8 => out.extend_from_slice(&[g, g, g]),
                    PixelLayout::Rgba8 => out.extend_from_slice(&[g, g, g, u8::MAX]),
                }
            }
        };

        if self.flip_vertical {
            samples.chunks_exact(width).rev().for_each(&mut push_row);
        } else {
            samples.chunks_exact(width).for_each(&mut push_row);
        }

        Ok(out)
    }
}

/// `clamp(round(d * 255), 0, 255)`. NaN maps to 0.
pub fn depth_to_gray(d: f32) -> u8 {
    if d.is_nan() {
        return 0;
    }
    (d * 255.0).round().clamp(0.0, 255.0) as u8
}

// ── Tests ────────────────────────────────────────────────────────
