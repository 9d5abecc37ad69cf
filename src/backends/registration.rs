// SPDX-License-Identifier: GPL-3.0-only

//! Colour-to-depth registration
//!
//! The Kinect colour camera sits beside the depth camera, so a colour pixel
//! with the same coordinates as a depth pixel shows a different point. The
//! device calibration gives, per depth pixel, a fixed-point colour position
//! plus a depth-dependent horizontal shift (libfreenect's formula). Resampling
//! the colour frame through it puts both images on the depth grid, which is
//! where the ROI is measured.

use super::types::{ColorFrame, DepthFrame};

/// Fixed-point scale of the x values in the registration table
pub const REG_X_VAL_SCALE: i32 = 256;

/// Largest depth in millimetres covered by the shift table
const MAX_SHIFT_DEPTH_MM: u16 = 10_000;

/// Device calibration mapping depth pixels to colour pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRegistration {
    /// Per depth pixel `[x * REG_X_VAL_SCALE, y]` in colour space
    pub registration_table: Vec<[i32; 2]>,
    /// Horizontal shift indexed by depth in millimetres
    pub depth_to_rgb_shift: Vec<i32>,
    /// Rows trimmed from the top of the colour image
    pub target_offset: u32,
}

impl ColorRegistration {
    /// Colour pixel showing the same point as depth pixel (x, y)
    ///
    /// `None` for invalid depth, missing calibration or when the point falls
    /// outside the colour image.
    pub fn color_coords(
        &self,
        x: u32,
        y: u32,
        depth_mm: u16,
        depth_width: u32,
        color: &ColorFrame,
    ) -> Option<(u32, u32)> {
        if depth_mm == 0 {
            return None;
        }
        let idx = y as usize * depth_width as usize + x as usize;
        let [reg_x, reg_y] = *self.registration_table.get(idx)?;
        let shift = *self
            .depth_to_rgb_shift
            .get(depth_mm.min(MAX_SHIFT_DEPTH_MM) as usize)?;

        let color_x = (reg_x + shift).div_euclid(REG_X_VAL_SCALE);
        let color_y = reg_y - self.target_offset as i32;
        if color_x < 0 || color_y < 0 {
            return None;
        }
        let (color_x, color_y) = (color_x as u32, color_y as u32);
        (color_x < color.width && color_y < color.height).then_some((color_x, color_y))
    }

    /// Resample `color` onto the depth grid
    ///
    /// Depth pixels without a colour counterpart stay black. The result keeps
    /// the channel order of `color`.
    pub fn align(&self, color: &ColorFrame, depth: &DepthFrame) -> ColorFrame {
        let mut aligned = ColorFrame::new(depth.width, depth.height, color.format);
        for y in 0..depth.height {
            for x in 0..depth.width {
                let Some(depth_mm) = depth.get(x, y) else {
                    continue;
                };
                let Some((cx, cy)) = self.color_coords(x, y, depth_mm, depth.width, color) else {
                    continue;
                };
                if let Some(pixel) = color.stored(cx, cy) {
                    aligned.put(x, y, pixel);
                }
            }
        }
        aligned
    }
}
