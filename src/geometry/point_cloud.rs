// SPDX-License-Identifier: GPL-3.0-only

//! Point cloud extraction from a depth window
//!
//! Every pixel with a non-zero depth becomes one point `(x, y, depth)`.
//! Coordinates stay in raw pixel / sensor units; nothing is unprojected
//! through the intrinsics here.

use crate::backends::types::DepthFrame;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Rectangular region of interest in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the ROI lies completely inside a `width` x `height` frame
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }
}

impl std::fmt::Display for Roi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for Roi {
    type Err = String;

    /// Parses `x,y,width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected x,y,width,height but got '{}'", s));
        }
        let mut values = [0u32; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| format!("'{}' is not a pixel coordinate", part))?;
        }
        let [x, y, width, height] = values;
        if width == 0 || height == 0 {
            return Err("ROI width and height must be non-zero".to_string());
        }
        Ok(Roi::new(x, y, width, height))
    }
}

/// One valid depth reading inside a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthSample {
    pub x: u32,
    pub y: u32,
    pub depth: u16,
}

/// Borrowed, strided window over a depth buffer
#[derive(Debug, Clone, Copy)]
pub struct DepthView<'a> {
    data: &'a [u16],
    width: u32,
    height: u32,
    stride: u32,
}

impl<'a> DepthView<'a> {
    /// Tightly packed `width` x `height` buffer; `None` if `data` is too short
    pub fn new(data: &'a [u16], width: u32, height: u32) -> Option<Self> {
        if data.len() < width as usize * height as usize {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            stride: width,
        })
    }

    pub fn from_frame(frame: &'a DepthFrame) -> Self {
        Self {
            data: &frame.data,
            width: frame.width,
            height: frame.height,
            stride: frame.width,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sub-window relative to this view; `None` if it does not fit
    pub fn crop(&self, roi: Roi) -> Option<DepthView<'a>> {
        if !roi.fits_within(self.width, self.height) {
            return None;
        }
        let offset = roi.y as usize * self.stride as usize + roi.x as usize;
        Some(DepthView {
            data: &self.data[offset..],
            width: roi.width,
            height: roi.height,
            stride: self.stride,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.stride as usize + x as usize)
            .copied()
    }

    /// Valid samples in row-major order
    pub fn samples(&self) -> impl Iterator<Item = DepthSample> + '_ {
        (0..self.height).flat_map(move |y| {
            let start = y as usize * self.stride as usize;
            let row = &self.data[start..start + self.width as usize];
            row.iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(move |(x, &depth)| DepthSample {
                    x: x as u32,
                    y,
                    depth,
                })
        })
    }
}

/// Extracted 3-D points, in extraction order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point3<f64>>,
}

impl PointCloud {
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f64>> {
        self.points.iter()
    }

    /// Mean of the z (depth) coordinates
    pub fn mean_depth(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        let sum: f64 = self.points.iter().map(|p| p.z).sum();
        Some(sum / self.points.len() as f64)
    }
}

impl From<Vec<Point3<f64>>> for PointCloud {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }
}

impl FromIterator<DepthSample> for PointCloud {
    fn from_iter<I: IntoIterator<Item = DepthSample>>(iter: I) -> Self {
        let points = iter
            .into_iter()
            .map(|s| Point3::new(s.x as f64, s.y as f64, s.depth as f64))
            .collect();
        Self { points }
    }
}

/// Convert every non-zero sample of `view` into a point
pub fn extract_point_cloud(view: &DepthView<'_>) -> PointCloud {
    view.samples().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_depth_is_skipped() {
        let data = [0u16, 5, 0, 7];
        let view = DepthView::new(&data, 2, 2).unwrap();
        let cloud = extract_point_cloud(&view);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[0], Point3::new(1.0, 0.0, 5.0));
        assert_eq!(cloud.points()[1], Point3::new(1.0, 1.0, 7.0));
    }

    #[test]
    fn test_all_zero_window_gives_empty_cloud() {
        let data = vec![0u16; 64];
        let view = DepthView::new(&data, 8, 8).unwrap();
        let cloud = extract_point_cloud(&view);
        assert!(cloud.is_empty());
        assert_eq!(cloud.mean_depth(), None);
    }

    #[test]
    fn test_crop_uses_parent_stride() {
        // 4x3 frame, value = 10 * y + x + 1
        let data: Vec<u16> = (0..3)
            .flat_map(|y| (0..4).map(move |x| (10 * y + x + 1) as u16))
            .collect();
        let view = DepthView::new(&data, 4, 3).unwrap();
        let roi = view.crop(Roi::new(1, 1, 2, 2)).unwrap();

        assert_eq!(roi.get(0, 0), Some(12));
        assert_eq!(roi.get(1, 1), Some(23));
        assert_eq!(roi.get(2, 0), None);

        // Points are relative to the ROI origin
        let cloud = extract_point_cloud(&roi);
        let coords: Vec<(f64, f64, f64)> = cloud.iter().map(|p| (p.x, p.y, p.z)).collect();
        assert_eq!(
            coords,
            vec![
                (0.0, 0.0, 12.0),
                (1.0, 0.0, 13.0),
                (0.0, 1.0, 22.0),
                (1.0, 1.0, 23.0)
            ]
        );
    }

    #[test]
    fn test_crop_outside_frame_is_rejected() {
        let data = vec![1u16; 16];
        let view = DepthView::new(&data, 4, 4).unwrap();
        assert!(view.crop(Roi::new(3, 0, 2, 2)).is_none());
        assert!(view.crop(Roi::new(0, 0, 0, 2)).is_none());
        assert!(view.crop(Roi::new(u32::MAX, 0, 2, 2)).is_none());
    }

    #[test]
    fn test_roi_parse() {
        assert_eq!(
            "200,100,240,200".parse::<Roi>(),
            Ok(Roi::new(200, 100, 240, 200))
        );
        assert_eq!(" 1, 2, 3, 4 ".parse::<Roi>(), Ok(Roi::new(1, 2, 3, 4)));
        assert!("1,2,3".parse::<Roi>().is_err());
        assert!("1,2,0,4".parse::<Roi>().is_err());
        assert!("a,2,3,4".parse::<Roi>().is_err());
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let data: Vec<u16> = (0..100).map(|i| (i % 7) as u16).collect();
        let view = DepthView::new(&data, 10, 10).unwrap();
        assert_eq!(extract_point_cloud(&view), extract_point_cloud(&view));
    }
}
