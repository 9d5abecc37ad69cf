// SPDX-License-Identifier: GPL-3.0-only

//! Depth colorization for display
//!
//! Renders raw depth into a BGR8 image with the turbo colormap
//! (blue = near, red = far). Invalid (zero) depth is black.

use super::types::{ColorFormat, ColorFrame, DepthFrame};
use crate::constants::{COLORIZE_MAX_M, COLORIZE_MIN_M};

/// Turbo colormap: perceptually uniform rainbow (blue=near, red=far)
///
/// Based on: https://ai.googleblog.com/2019/08/turbo-improved-rainbow-colormap-for.html
/// Simplified version with polynomial approximation. Returns RGB.
#[inline]
fn turbo(t: f32) -> [u8; 3] {
    let r = (0.13572138
        + t * (4.6153926 + t * (-42.66032 + t * (132.13108 + t * (-152.54825 + t * 59.28144)))))
        .clamp(0.0, 1.0);
    let g = (0.09140261
        + t * (2.19418 + t * (4.84296 + t * (-14.18503 + t * (4.27805 + t * 2.53377)))))
        .clamp(0.0, 1.0);
    let b = (0.1066733
        + t * (12.64194 + t * (-60.58204 + t * (109.99648 + t * (-82.52904 + t * 20.43388)))))
        .clamp(0.0, 1.0);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Maps depth in metres onto the colormap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colorizer {
    /// Distance mapped to the start of the colormap
    pub min_m: f32,
    /// Distance mapped to the end of the colormap
    pub max_m: f32,
    /// Grayscale instead of turbo (bright = near)
    pub grayscale: bool,
}

impl Default for Colorizer {
    fn default() -> Self {
        Self {
            min_m: COLORIZE_MIN_M,
            max_m: COLORIZE_MAX_M,
            grayscale: false,
        }
    }
}

impl Colorizer {
    pub fn new(min_m: f32, max_m: f32) -> Self {
        Self {
            min_m,
            max_m,
            grayscale: false,
        }
    }

    /// Colour of one raw depth value, as BGR
    #[inline]
    pub fn color_of(&self, depth: u16, depth_scale: f64) -> [u8; 3] {
        if depth == 0 {
            return [0, 0, 0];
        }
        let metres = (f64::from(depth) * depth_scale) as f32;
        let span = (self.max_m - self.min_m).max(f32::EPSILON);
        let t = ((metres - self.min_m) / span).clamp(0.0, 1.0);

        if self.grayscale {
            let gray = ((1.0 - t) * 255.0) as u8;
            [gray, gray, gray]
        } else {
            let [r, g, b] = turbo(t);
            [b, g, r]
        }
    }

    /// Render a whole depth frame
    pub fn colorize(&self, depth: &DepthFrame, depth_scale: f64) -> ColorFrame {
        let mut data = Vec::with_capacity(depth.data.len() * 3);
        for &d in &depth.data {
            data.extend_from_slice(&self.color_of(d, depth_scale));
        }
        ColorFrame {
            width: depth.width,
            height: depth.height,
            format: ColorFormat::Bgr8,
            data,
        }
    }
}
