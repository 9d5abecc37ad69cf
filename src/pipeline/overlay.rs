// SPDX-License-Identifier: GPL-3.0-only

//! Overlay text, ROI outline and snapshots

use super::FrameReport;
use crate::backends::image_sequence::COLOR_SUFFIX;
use crate::backends::types::{ColorFormat, ColorFrame, FrameSet};
use crate::constants::{PLANE_ANGLE_LABEL, ROI_COLOR_BGR, ROI_THICKNESS, Y_ROTATION_LABEL};
use crate::errors::{AppError, AppResult};
use crate::geometry::Roi;
use std::path::{Path, PathBuf};
use tracing::info;

/// `"<label>: 12.34 degrees"`, or `"<label>: -- degrees"` without a value
pub fn format_angle_text(label: &str, angle: Option<f64>) -> String {
    match angle {
        Some(angle) => format!("{}: {:.2} degrees", label, angle),
        None => format!("{}: -- degrees", label),
    }
}

/// Outline `roi` in `frame`, clipped to the frame
///
/// `color` is given in the frame's storage order. The outline grows inwards
/// from the ROI border.
pub fn draw_rectangle(frame: &mut ColorFrame, roi: Roi, color: [u8; 3], thickness: u32) {
    if roi.width == 0 || roi.height == 0 || thickness == 0 {
        return;
    }
    let right = roi.x.saturating_add(roi.width);
    let bottom = roi.y.saturating_add(roi.height);
    let t = thickness.min(roi.width).min(roi.height);

    for y in roi.y..bottom.min(frame.height) {
        let on_edge_row = y < roi.y + t || y >= bottom - t;
        for x in roi.x..right.min(frame.width) {
            if on_edge_row || x < roi.x + t || x >= right - t {
                frame.put(x, y, color);
            }
        }
    }
}

/// Last displayed angle values
///
/// A frame without a value leaves the previous one on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayState {
    y_rotation: Option<f64>,
    plane_angle: Option<f64>,
}

impl OverlayState {
    pub fn update(&mut self, report: &FrameReport) {
        if report.y_rotation.is_some() {
            self.y_rotation = report.y_rotation;
        }
        if report.plane_angle.is_some() {
            self.plane_angle = report.plane_angle;
        }
    }

    pub fn y_rotation(&self) -> Option<f64> {
        self.y_rotation
    }

    pub fn plane_angle(&self) -> Option<f64> {
        self.plane_angle
    }

    pub fn lines(&self) -> [String; 2] {
        [
            format_angle_text(Y_ROTATION_LABEL, self.y_rotation),
            format_angle_text(PLANE_ANGLE_LABEL, self.plane_angle),
        ]
    }
}

/// Colour (or colorized depth) buffer with the ROI drawn on top
pub fn render_overlay(frames: &FrameSet, roi: Roi, show_depth: bool) -> ColorFrame {
    let mut frame = if show_depth {
        frames.colorized_depth.clone()
    } else {
        frames.color.clone()
    };
    let color = match frame.format {
        ColorFormat::Bgr8 => ROI_COLOR_BGR,
        ColorFormat::Rgb8 => [ROI_COLOR_BGR[2], ROI_COLOR_BGR[1], ROI_COLOR_BGR[0]],
    };
    draw_rectangle(&mut frame, roi, color, ROI_THICKNESS);
    frame
}

/// Files written by [`save_snapshot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// 16-bit grayscale PNG of the raw depth
    pub depth: PathBuf,
    /// Overlaid colour image
    pub color: PathBuf,
}

/// Save the raw depth and the overlaid colour frame into `dir`
///
/// The pair is laid out so the image-sequence source can replay it.
pub fn save_snapshot(dir: &Path, frames: &FrameSet, overlaid: &ColorFrame) -> AppResult<Snapshot> {
    std::fs::create_dir_all(dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    let stem = format!("plane_{}", timestamp);
    let depth_path = dir.join(format!("{}.png", stem));
    let color_path = dir.join(format!("{}{}", stem, COLOR_SUFFIX));

    let depth: image::ImageBuffer<image::Luma<u16>, Vec<u16>> = image::ImageBuffer::from_raw(
        frames.depth.width,
        frames.depth.height,
        frames.depth.data.clone(),
    )
    .ok_or_else(|| AppError::Storage("depth buffer size mismatch".to_string()))?;
    depth.save(&depth_path)?;

    let rgb = overlaid.to_format(ColorFormat::Rgb8);
    let color: image::RgbImage = image::ImageBuffer::from_raw(rgb.width, rgb.height, rgb.data)
        .ok_or_else(|| AppError::Storage("colour buffer size mismatch".to_string()))?;
    color.save(&color_path)?;

    info!(path = %depth_path.display(), "Snapshot saved");
    Ok(Snapshot {
        depth: depth_path,
        color: color_path,
    })
}
