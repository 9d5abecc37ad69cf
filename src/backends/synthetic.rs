// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic tilted-plane pipeline
//!
//! Generates a single planar surface filling the whole frame. Depth varies
//! linearly with the pixel position:
//!
//! ```text
//! depth(x, y) = base + (x - cx) * tan(tilt_y) + (y - cy) * tan(tilt_x)
//! ```
//!
//! so a plane fit in pixel/depth-unit space recovers `tilt_y` (about the
//! vertical axis) and `tilt_x` (about the horizontal axis) exactly, up to
//! depth quantisation. Optional periodic dropouts exercise hole filling and
//! an optional sweep rocks the plane back and forth over time.

use super::filters::PostProcessing;
use super::types::{
    ColorFormat, ColorFrame, DepthFrame, FrameSet, Intrinsics, StreamConfig, StreamProfile,
};
use super::{SensorPipeline, SensorResult};
use crate::constants::{
    DEFAULT_DEPTH_SCALE, SYNTHETIC_BASE_DEPTH_MM, SYNTHETIC_DROPOUT_PERIOD, SYNTHETIC_TILT_DEG,
};
use crate::errors::SensorError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Scene description for the synthetic pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticScene {
    /// Rotation about the vertical axis in degrees (depth changes along x)
    pub tilt_y_deg: f64,
    /// Rotation about the horizontal axis in degrees (depth changes along y)
    pub tilt_x_deg: f64,
    /// Depth at the frame centre in millimetres
    pub base_depth_mm: f64,
    /// Every n-th pixel (in a skewed pattern) reads as zero; 0 disables dropouts
    pub dropout_period: u32,
    /// Peak additional `tilt_y` of the sweep in degrees; 0 disables the sweep
    pub sweep_amplitude_deg: f64,
    /// Frames per full sweep cycle
    pub sweep_period_frames: u32,
    /// Pace frames to the stream frame rate
    pub realtime: bool,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            tilt_y_deg: SYNTHETIC_TILT_DEG,
            tilt_x_deg: 0.0,
            base_depth_mm: SYNTHETIC_BASE_DEPTH_MM,
            dropout_period: SYNTHETIC_DROPOUT_PERIOD,
            sweep_amplitude_deg: 0.0,
            sweep_period_frames: 150,
            realtime: true,
        }
    }
}

impl SyntheticScene {
    /// Still scene without dropouts or pacing
    pub fn still(tilt_y_deg: f64, tilt_x_deg: f64) -> Self {
        Self {
            tilt_y_deg,
            tilt_x_deg,
            dropout_period: 0,
            realtime: false,
            ..Self::default()
        }
    }

    /// Tilt about the vertical axis for a given frame, including the sweep
    pub fn tilt_y_at(&self, frame: u64) -> f64 {
        if self.sweep_amplitude_deg == 0.0 || self.sweep_period_frames == 0 {
            return self.tilt_y_deg;
        }
        let phase = (frame % self.sweep_period_frames as u64) as f64
            / self.sweep_period_frames as f64
            * std::f64::consts::TAU;
        self.tilt_y_deg + self.sweep_amplitude_deg * phase.sin()
    }

    /// Render depth for one frame
    pub fn render_depth(&self, width: u32, height: u32, frame: u64) -> DepthFrame {
        let slope_x = self.tilt_y_at(frame).to_radians().tan();
        let slope_y = self.tilt_x_deg.to_radians().tan();
        let cx = width as f64 / 2.0;
        let cy = height as f64 / 2.0;

        let shift = match self.dropout_period {
            0 => 0,
            period => (frame % period as u64) as u32,
        };

        let mut depth = DepthFrame::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let dropout = self.dropout_period > 0
                    && (x * 7 + y * 13 + shift) % self.dropout_period == 0;
                if dropout {
                    continue;
                }
                let z = self.base_depth_mm + (x as f64 - cx) * slope_x + (y as f64 - cy) * slope_y;
                let idx = y as usize * width as usize + x as usize;
                depth.data[idx] = z.round().clamp(0.0, u16::MAX as f64) as u16;
            }
        }
        depth
    }
}

/// Shaded grey rendering of depth with a faint grid, stored as BGR
fn render_color(depth: &DepthFrame, base_depth_mm: f64) -> ColorFrame {
    let mut color = ColorFrame::new(depth.width, depth.height, ColorFormat::Bgr8);
    for y in 0..depth.height {
        for x in 0..depth.width {
            let d = f64::from(depth.data[y as usize * depth.width as usize + x as usize]);
            let shade = if d == 0.0 {
                0.0
            } else {
                (160.0 - (d - base_depth_mm) * 0.25).clamp(40.0, 230.0)
            };
            let grid = if x % 40 == 0 || y % 40 == 0 { 25.0 } else { 0.0 };
            let v = (shade - grid).max(0.0) as u8;
            color.put(x, y, [v, v, v]);
        }
    }
    color
}

/// Pipeline producing [`SyntheticScene`] frames
pub struct SyntheticPipeline {
    scene: SyntheticScene,
    post: PostProcessing,
    profile: Option<StreamProfile>,
    frame_number: u64,
    next_deadline: Option<Instant>,
}

impl SyntheticPipeline {
    pub fn new(scene: SyntheticScene, post: PostProcessing) -> Self {
        Self {
            scene,
            post,
            profile: None,
            frame_number: 0,
            next_deadline: None,
        }
    }

    fn pace(&mut self, framerate: u32) {
        if !self.scene.realtime || framerate == 0 {
            return;
        }
        let interval = Duration::from_secs_f64(1.0 / framerate as f64);
        let now = Instant::now();
        match self.next_deadline {
            Some(deadline) if deadline > now => {
                std::thread::sleep(deadline - now);
                self.next_deadline = Some(deadline + interval);
            }
            _ => self.next_deadline = Some(now + interval),
        }
    }
}

impl SensorPipeline for SyntheticPipeline {
    fn start(&mut self, config: &StreamConfig) -> SensorResult<StreamProfile> {
        if config.width == 0 || config.height == 0 {
            return Err(SensorError::StartFailed(format!(
                "invalid stream size {}x{}",
                config.width, config.height
            )));
        }

        let profile = StreamProfile {
            config: *config,
            depth_scale: DEFAULT_DEPTH_SCALE,
            intrinsics: Intrinsics::kinect_default(config.width, config.height),
        };

        info!(
            stream = %config,
            tilt_y = self.scene.tilt_y_deg,
            tilt_x = self.scene.tilt_x_deg,
            "Starting synthetic pipeline"
        );

        self.profile = Some(profile);
        self.frame_number = 0;
        self.next_deadline = None;
        Ok(profile)
    }

    fn wait_for_frames(&mut self) -> SensorResult<FrameSet> {
        let profile = self.profile.ok_or(SensorError::NotStarted)?;
        self.pace(profile.config.framerate);

        let number = self.frame_number;
        self.frame_number += 1;

        let depth = self
            .scene
            .render_depth(profile.config.width, profile.config.height, number);
        let color = render_color(&depth, self.scene.base_depth_mm);
        debug!(frame = number, "Synthetic frame generated");

        Ok(self.post.finish(number, color, depth, &profile))
    }

    fn stop(&mut self) {
        if self.profile.take().is_some() {
            info!(frames = self.frame_number, "Synthetic pipeline stopped");
        }
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::filters::HoleFillingMode;

    #[test]
    fn test_wait_before_start_fails() {
        let mut pipeline =
            SyntheticPipeline::new(SyntheticScene::default(), PostProcessing::default());
        assert_eq!(
            pipeline.wait_for_frames().unwrap_err(),
            SensorError::NotStarted
        );
    }

    #[test]
    fn test_flat_scene_has_constant_depth() {
        let depth = SyntheticScene::still(0.0, 0.0).render_depth(16, 8, 0);
        assert!(depth.data.iter().all(|&d| d == 1000));
    }

    #[test]
    fn test_tilt_changes_depth_along_x() {
        let depth = SyntheticScene::still(45.0, 0.0).render_depth(10, 2, 0);
        // Slope of 1 depth unit per pixel, centred on x = 5
        assert_eq!(depth.get(5, 0), Some(1000));
        assert_eq!(depth.get(9, 1), Some(1004));
        assert_eq!(depth.get(0, 0), Some(995));
    }

    #[test]
    fn test_dropouts_are_filled_by_post_processing() {
        let scene = SyntheticScene {
            dropout_period: 5,
            realtime: false,
            ..SyntheticScene::still(0.0, 0.0)
        };
        assert!(scene.render_depth(20, 20, 0).data.contains(&0));

        let post = PostProcessing::new(Some(HoleFillingMode::FarestFromAround), Default::default());
        let mut pipeline = SyntheticPipeline::new(scene, post);
        let config = StreamConfig {
            width: 20,
            height: 20,
            ..StreamConfig::default()
        };
        pipeline.start(&config).unwrap();
        let frames = pipeline.wait_for_frames().unwrap();
        assert!(frames.depth.data.iter().all(|&d| d == 1000));
        assert_eq!(frames.number, 0);
        assert_eq!(pipeline.wait_for_frames().unwrap().number, 1);
    }

    #[test]
    fn test_sweep_oscillates_around_tilt() {
        let scene = SyntheticScene {
            sweep_amplitude_deg: 10.0,
            sweep_period_frames: 4,
            ..SyntheticScene::still(20.0, 0.0)
        };
        assert!((scene.tilt_y_at(0) - 20.0).abs() < 1e-9);
        assert!((scene.tilt_y_at(1) - 30.0).abs() < 1e-9);
        assert!((scene.tilt_y_at(3) - 10.0).abs() < 1e-9);
    }
}
