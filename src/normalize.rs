//! Image normalization shared by dataset building and live inference.
//!
//! Both entry points decode their input, convert it to 8-bit luma and resize
//! it to the configured [`FrameSize`] with an area-averaging filter. Pixels
//! stay in `0..=255`; the only conversion to model input is
//! [`to_unit_range`], so training and inference scale identically.

use std::fmt;
use std::fs;
use std::path::Path;

use image::error::{ParameterError, ParameterErrorKind};
use image::{GrayImage, ImageError};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeOrigin, StigError};

/// Height and width of every normalized frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub height: u32,
    pub width: u32,
}

impl FrameSize {
    /// Creates a frame size, rejecting zero dimensions.
    pub fn new(height: u32, width: u32) -> Result<Self, StigError> {
        if height == 0 || width == 0 {
            return Err(StigError::InvalidFrameSize { height, width });
        }
        Ok(Self { height, width })
    }

    /// Number of bytes (one per pixel) in a frame of this size.
    #[inline]
    pub fn pixels(&self) -> usize {
        self.height as usize * self.width as usize
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} (HxW)", self.height, self.width)
    }
}

/// A decoded, grayscale, fixed-size frame. Row-major, one byte per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedImage {
    size: FrameSize,
    pixels: Vec<u8>,
}

impl NormalizedImage {
    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Pixel at row `y`, column `x`.
    pub fn pixel(&self, y: u32, x: u32) -> Option<u8> {
        if y >= self.size.height || x >= self.size.width {
            return None;
        }
        self.pixels
            .get(y as usize * self.size.width as usize + x as usize)
            .copied()
    }

    /// Model input for this frame, see [`to_unit_range`].
    pub fn to_unit_range(&self) -> Vec<f32> {
        to_unit_range(&self.pixels)
    }

    /// Writes the frame as a grayscale PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), StigError> {
        let image = GrayImage::from_raw(self.size.width, self.size.height, self.pixels.clone())
            .ok_or(StigError::InvalidFrameSize {
                height: self.size.height,
                width: self.size.width,
            })?;

        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| StigError::ImageWrite {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Decodes the image file at `path` and normalizes it to `size`.
///
/// The file is read fully and handed to the same code path as
/// [`normalize_from_bytes`], so both produce identical pixels for the same
/// file. The format is detected from the content, not the extension.
pub fn normalize_from_path(path: &Path, size: FrameSize) -> Result<NormalizedImage, StigError> {
    let mut pixels = vec![0u8; size.pixels()];
    normalize_path_into(path, size, &mut pixels)?;
    Ok(NormalizedImage { size, pixels })
}

/// Decodes an in-memory image (e.g. a request body) and normalizes it to `size`.
pub fn normalize_from_bytes(buffer: &[u8], size: FrameSize) -> Result<NormalizedImage, StigError> {
    let mut pixels = vec![0u8; size.pixels()];
    normalize_into(buffer, size, &mut pixels, || DecodeOrigin::Buffer {
        len: buffer.len(),
    })?;
    Ok(NormalizedImage { size, pixels })
}

/// Normalizes the file at `path` straight into `out`, which must hold
/// exactly `size.pixels()` bytes. Used by the dataset builder to fill
/// preallocated slots.
pub(crate) fn normalize_path_into(
    path: &Path,
    size: FrameSize,
    out: &mut [u8],
) -> Result<(), StigError> {
    let bytes = fs::read(path).map_err(|source| StigError::path_io(path, source))?;
    normalize_into(&bytes, size, out, || DecodeOrigin::File(path.to_path_buf()))
}

fn normalize_into(
    bytes: &[u8],
    size: FrameSize,
    out: &mut [u8],
    origin: impl Fn() -> DecodeOrigin,
) -> Result<(), StigError> {
    debug_assert_eq!(out.len(), size.pixels());

    let luma = image::load_from_memory(bytes)
        .map_err(|source| StigError::Decode {
            origin: origin(),
            source,
        })?
        .into_luma8();

    if luma.width() == 0 || luma.height() == 0 {
        return Err(StigError::Decode {
            origin: origin(),
            source: ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )),
        });
    }

    resize_area_into(luma.as_raw(), luma.width(), luma.height(), out, size);
    Ok(())
}

/// Scales 8-bit pixels to `[0, 1]` by dividing by 255.
pub fn to_unit_range(pixels: &[u8]) -> Vec<f32> {
    pixels.iter().map(|&p| p as f32 / 255.0).collect()
}

/// Resizes a row-major 8-bit single-channel image with area averaging.
pub fn resize_area(src: &[u8], src_width: u32, src_height: u32, size: FrameSize) -> Vec<u8> {
    let mut out = vec![0u8; size.pixels()];
    resize_area_into(src, src_width, src_height, &mut out, size);
    out
}

/// Source pixels covering one destination pixel along a single axis.
struct Taps {
    first: usize,
    weights: Vec<f64>,
}

/// For each destination index, the source indices under its footprint and
/// their fractional coverage, normalized to sum to 1.
fn area_taps(src: usize, dst: usize) -> Vec<Taps> {
    let scale = src as f64 / dst as f64;

    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src as f64);
            let first = (start.floor() as usize).min(src - 1);

            let mut weights = Vec::new();
            let mut s = first;
            while s < src && (s as f64) < end {
                let lo = start.max(s as f64);
                let hi = end.min((s + 1) as f64);
                weights.push((hi - lo).max(0.0));
                s += 1;
            }

            let total: f64 = weights.iter().sum();
            if total > 0.0 {
                weights.iter_mut().for_each(|w| *w /= total);
            } else {
                weights = vec![1.0];
            }

            Taps { first, weights }
        })
        .collect()
}

fn resize_area_into(src: &[u8], src_width: u32, src_height: u32, out: &mut [u8], size: FrameSize) {
    let (src_w, src_h) = (src_width as usize, src_height as usize);
    let (dst_w, dst_h) = (size.width as usize, size.height as usize);
    debug_assert_eq!(src.len(), src_w * src_h);

    let x_taps = area_taps(src_w, dst_w);
    let y_taps = area_taps(src_h, dst_h);

    // Horizontal pass: src_h rows of dst_w averaged columns.
    let mut rows = vec![0f64; src_h * dst_w];
    for (y, row) in src.chunks_exact(src_w).enumerate() {
        let out_row = &mut rows[y * dst_w..(y + 1) * dst_w];
        for (value, taps) in out_row.iter_mut().zip(&x_taps) {
            *value = taps
                .weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * row[taps.first + k] as f64)
                .sum();
        }
    }

    // Vertical pass.
    for (oy, taps) in y_taps.iter().enumerate() {
        let out_row = &mut out[oy * dst_w..(oy + 1) * dst_w];
        for (ox, pixel) in out_row.iter_mut().enumerate() {
            let value: f64 = taps
                .weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * rows[(taps.first + k) * dst_w + ox])
                .sum();
            *pixel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}
