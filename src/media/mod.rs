// SPDX-License-Identifier: MPL-2.0

//! Pixel conversion and image encoding for replacement frames

pub mod yuv;

pub use yuv::{downscale, encode_jpeg, nv21_to_jpeg, nv21_to_rgb};
