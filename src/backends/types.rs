// SPDX-License-Identifier: GPL-3.0-only

//! Shared frame and stream types for sensor pipelines

use crate::constants::{DEFAULT_STREAM_FPS, DEFAULT_STREAM_HEIGHT, DEFAULT_STREAM_WIDTH};
use serde::{Deserialize, Serialize};

/// Colour stream pixel layout (3 bytes per pixel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColorFormat {
    /// Blue, green, red
    #[default]
    Bgr8,
    /// Red, green, blue
    Rgb8,
}

/// Depth stream pixel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DepthFormat {
    /// 16-bit unsigned range units
    #[default]
    Z16,
}

/// Requested stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Frame width (colour and depth are aligned to the same grid)
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frames per second
    pub framerate: u32,
    pub color_format: ColorFormat,
    pub depth_format: DepthFormat,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_STREAM_WIDTH,
            height: DEFAULT_STREAM_HEIGHT,
            framerate: DEFAULT_STREAM_FPS,
            color_format: ColorFormat::Bgr8,
            depth_format: DepthFormat::Z16,
        }
    }
}

impl std::fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}@{}fps {:?}/{:?}",
            self.width, self.height, self.framerate, self.color_format, self.depth_format
        )
    }
}

/// Lens distortion model reported with the intrinsics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistortionModel {
    #[default]
    None,
    BrownConrady,
    InverseBrownConrady,
}

/// Pinhole camera intrinsics
///
/// Carried with every frame. The angle math works in pixel space and does
/// not unproject through these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    /// Focal length X (pixels)
    pub fx: f32,
    /// Focal length Y (pixels)
    pub fy: f32,
    /// Principal point X (pixels)
    pub ppx: f32,
    /// Principal point Y (pixels)
    pub ppy: f32,
    pub model: DistortionModel,
    pub coeffs: [f32; 5],
}

impl Intrinsics {
    /// Focal length X (pixels) of the Kinect v1 depth camera at 640x480
    pub const KINECT_FX: f32 = 594.21;
    /// Focal length Y (pixels) of the Kinect v1 depth camera at 640x480
    pub const KINECT_FY: f32 = 591.04;
    /// Principal point X (pixels) of the Kinect v1 depth camera at 640x480
    pub const KINECT_CX: f32 = 339.5;
    /// Principal point Y (pixels) of the Kinect v1 depth camera at 640x480
    pub const KINECT_CY: f32 = 242.7;

    const KINECT_BASE_WIDTH: f32 = 640.0;
    const KINECT_BASE_HEIGHT: f32 = 480.0;

    /// Kinect v1 intrinsics scaled to the given resolution
    pub fn kinect_default(width: u32, height: u32) -> Self {
        let sx = width as f32 / Self::KINECT_BASE_WIDTH;
        let sy = height as f32 / Self::KINECT_BASE_HEIGHT;
        Self {
            width,
            height,
            fx: Self::KINECT_FX * sx,
            fy: Self::KINECT_FY * sy,
            ppx: Self::KINECT_CX * sx,
            ppy: Self::KINECT_CY * sy,
            model: DistortionModel::None,
            coeffs: [0.0; 5],
        }
    }
}

/// What a started pipeline actually delivers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamProfile {
    pub config: StreamConfig,
    /// Metres per raw depth unit
    pub depth_scale: f64,
    pub intrinsics: Intrinsics,
}

/// 8-bit, 3-channel colour buffer (tightly packed, stride = width * 3)
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub data: Vec<u8>,
}

impl ColorFrame {
    /// Black frame
    pub fn new(width: u32, height: u32, format: ColorFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    /// Wrap existing pixel data; `None` if the length does not match
    pub fn from_raw(width: u32, height: u32, format: ColorFormat, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn stride(&self) -> usize {
        self.width as usize * 3
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.stride() + x as usize * 3)
    }

    /// Pixel at (x, y) in storage order
    pub fn stored(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let idx = self.offset(x, y)?;
        let p = self.data.get(idx..idx + 3)?;
        Some([p[0], p[1], p[2]])
    }

    /// Pixel at (x, y) as RGB regardless of storage order
    pub fn rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let [a, b, c] = self.stored(x, y)?;
        Some(match self.format {
            ColorFormat::Bgr8 => [c, b, a],
            ColorFormat::Rgb8 => [a, b, c],
        })
    }

    /// Store a pixel given in storage order; out-of-bounds writes are ignored
    pub fn put(&mut self, x: u32, y: u32, pixel: [u8; 3]) {
        let Some(idx) = self.offset(x, y) else {
            return;
        };
        if let Some(px) = self.data.get_mut(idx..idx + 3) {
            px.copy_from_slice(&pixel);
        }
    }

    /// Copy stored in the given channel order
    pub fn to_format(&self, format: ColorFormat) -> ColorFrame {
        let mut converted = self.clone();
        if format != self.format {
            for px in converted.data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            converted.format = format;
        }
        converted
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Raw 16-bit depth buffer (row-major, stride = width)
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u16>,
}

impl DepthFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Wrap existing samples; `None` if the length does not match
    pub fn from_raw(width: u32, height: u32, data: Vec<u16>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One aligned colour/depth frame pair with its metadata
///
/// Owned by a single loop iteration and dropped at its end.
#[derive(Debug, Clone)]
pub struct FrameSet {
    /// Sequence number within the current run (starts at 0)
    pub number: u64,
    pub color: ColorFrame,
    /// Raw range units
    pub depth: DepthFrame,
    /// Depth rendered through the colorizer
    pub colorized_depth: ColorFrame,
    /// Metres per raw depth unit
    pub depth_scale: f64,
    pub intrinsics: Intrinsics,
}
