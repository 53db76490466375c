// SPDX-License-Identifier: MPL-2.0

//! NV21 frame helpers
//!
//! Replacement frames travel as NV21: a full-resolution Y plane followed by
//! interleaved V/U samples at quarter resolution. This module converts them to
//! RGB for thumbnails and still captures, and encodes JPEG.

use crate::constants::yuv420_frame_size;
use image::codecs::jpeg::JpegEncoder;
use image::{RgbImage, imageops};
use tracing::debug;

/// Convert an NV21 frame to RGB (BT.601, limited range)
///
/// Dimensions must be even and `data` must hold at least a full frame.
pub fn nv21_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage, String> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(format!("Unsupported NV21 dimensions {}x{}", width, height));
    }
    let expected = yuv420_frame_size(width, height);
    if data.len() < expected {
        return Err(format!(
            "NV21 buffer too small: {} bytes for {}x{} (need {})",
            data.len(),
            width,
            height,
            expected
        ));
    }

    let width = width as usize;
    let height = height as usize;
    let (y_plane, vu_plane) = data[..expected].split_at(width * height);

    let mut rgb_data = vec![0u8; width * height * 3];

    // Two rows share one chroma row
    for y_idx in (0..height).step_by(2) {
        let vu_row = y_idx / 2;
        convert_row(y_plane, vu_plane, &mut rgb_data, y_idx, vu_row, width);
        convert_row(y_plane, vu_plane, &mut rgb_data, y_idx + 1, vu_row, width);
    }

    RgbImage::from_raw(width as u32, height as u32, rgb_data)
        .ok_or_else(|| "Failed to create RGB image from buffer".to_string())
}

#[inline]
fn convert_row(
    y_plane: &[u8],
    vu_plane: &[u8],
    rgb_data: &mut [u8],
    y_idx: usize,
    vu_row: usize,
    width: usize,
) {
    let y_row_start = y_idx * width;
    let vu_row_start = vu_row * width;
    let rgb_row_start = y_idx * width * 3;

    for x_idx in (0..width).step_by(2) {
        let vu_offset = vu_row_start + x_idx;

        // NV21 stores V before U
        let v = vu_plane[vu_offset] as i32 - 128;
        let u = vu_plane[vu_offset + 1] as i32 - 128;

        let r_v = (179 * v) >> 7;
        let g_u = (44 * u) >> 7;
        let g_v = (91 * v) >> 7;
        let b_u = (227 * u) >> 7;

        for dx in 0..2 {
            let luma = ((y_plane[y_row_start + x_idx + dx] as i32 - 16) * 149) >> 7;
            let rgb_offset = rgb_row_start + (x_idx + dx) * 3;
            rgb_data[rgb_offset] = (luma + r_v).clamp(0, 255) as u8;
            rgb_data[rgb_offset + 1] = (luma - g_u - g_v).clamp(0, 255) as u8;
            rgb_data[rgb_offset + 2] = (luma + b_u).clamp(0, 255) as u8;
        }
    }
}

/// Encode an RGB image as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode_image(image)?;
    debug!(
        width = image.width(),
        height = image.height(),
        bytes = out.len(),
        "Encoded JPEG"
    );
    Ok(out)
}

/// NV21 straight to JPEG
pub fn nv21_to_jpeg(data: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, String> {
    let rgb = nv21_to_rgb(data, width, height)?;
    encode_jpeg(&rgb, quality).map_err(|e| format!("JPEG encoding failed: {}", e))
}

/// Shrink by an integer divisor per axis, never below 1x1
pub fn downscale(image: &RgbImage, divisor: u32) -> RgbImage {
    let divisor = divisor.max(1);
    if divisor == 1 {
        return image.clone();
    }
    let width = (image.width() / divisor).max(1);
    let height = (image.height() / divisor).max(1);
    imageops::thumbnail(image, width, height)
}

/// Fill an NV21 buffer with a moving test pattern
///
/// Diagonal luma bands scroll by `frame_index`; chroma drifts slowly so
/// consecutive frames are distinguishable.
pub fn write_test_pattern(buffer: &mut [u8], width: u32, height: u32, frame_index: u64) {
    let width = width as usize;
    let height = height as usize;
    let y_size = width * height;
    if buffer.len() < y_size + y_size / 2 {
        return;
    }

    let shift = (frame_index % 256) as usize;
    for row in 0..height {
        let line = &mut buffer[row * width..(row + 1) * width];
        for (col, px) in line.iter_mut().enumerate() {
            *px = (16 + ((row + col + shift * 4) % 220)) as u8;
        }
    }

    let v = (128 + ((frame_index / 4) % 64) as i32 - 32) as u8;
    let u = (128 - ((frame_index / 4) % 64) as i32 + 32) as u8;
    for pair in buffer[y_size..y_size + y_size / 2].chunks_exact_mut(2) {
        pair[0] = v;
        pair[1] = u;
    }
}
