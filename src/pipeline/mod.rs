// SPDX-License-Identifier: GPL-3.0-only

//! Frame-cycle orchestrator
//!
//! One iteration per frame pair delivered by a [`SensorPipeline`]:
//!
//! 1. crop the fixed ROI out of the raw depth buffer
//! 2. extract the point cloud and fit a plane to it
//! 3. measure the plane angle against the camera vector
//! 4. measure the Y rotation of the configured normal
//! 5. hand the frame and its [`FrameReport`] to a [`FrameSink`]
//!
//! Iterations are independent. A degenerate ROI only means that frame has no
//! angle; acquisition failures end the loop.

pub mod overlay;

use crate::backends::SensorPipeline;
use crate::backends::types::{FrameSet, StreamConfig};
use crate::constants::{
    ASSUMED_PLANE_NORMAL, CAMERA_VECTOR, DEFAULT_ROI, PLANE_ANGLE_LABEL, Y_ROTATION_LABEL,
};
use crate::errors::{AppError, AppResult, ConfigError};
use crate::geometry::{
    DepthView, PlaneFit, PointCloud, Roi, angle_between, estimate_normal, extract_point_cloud,
    y_rotation,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

pub use overlay::{OverlayState, format_angle_text};

/// Action returned by a [`FrameSink`] to control the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Which normal the Y-rotation readout is computed from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum YRotationSource {
    /// The constant assumed normal, independent of the fit
    #[default]
    Assumed,
    /// The normal fitted to the current frame
    Fitted,
}

impl std::fmt::Display for YRotationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YRotationSource::Assumed => write!(f, "assumed"),
            YRotationSource::Fitted => write!(f, "fitted"),
        }
    }
}

/// Per-run settings of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCycleOptions {
    pub roi: Roi,
    /// Reference axis for the plane angle
    pub camera_vector: Vector3<f64>,
    pub y_rotation: YRotationSource,
    /// Normal used when `y_rotation` is [`YRotationSource::Assumed`]
    pub assumed_normal: Vector3<f64>,
}

impl Default for FrameCycleOptions {
    fn default() -> Self {
        let (x, y, width, height) = DEFAULT_ROI;
        Self {
            roi: Roi::new(x, y, width, height),
            camera_vector: Vector3::from(CAMERA_VECTOR),
            y_rotation: YRotationSource::default(),
            assumed_normal: Vector3::from(ASSUMED_PLANE_NORMAL),
        }
    }
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub roi: Roi,
    /// Valid depth samples inside the ROI
    pub point_count: usize,
    /// Unit plane normal, arbitrary sign
    pub normal: Option<[f64; 3]>,
    /// Why the fit failed, for invalid frames
    pub invalid_reason: Option<String>,
    /// Angle between the normal and the camera vector, degrees
    pub plane_angle: Option<f64>,
    /// Angle of the projected normal to the Y axis, degrees
    pub y_rotation: Option<f64>,
    /// Mean distance of the ROI samples in metres
    pub mean_distance_m: Option<f64>,
    #[serde(skip)]
    pub fit: PlaneFit,
}

impl FrameReport {
    pub fn is_valid(&self) -> bool {
        self.fit.is_valid()
    }

    /// Overlay text for this frame alone (no stale values)
    pub fn overlay_lines(&self) -> [String; 2] {
        [
            format_angle_text(Y_ROTATION_LABEL, self.y_rotation),
            format_angle_text(PLANE_ANGLE_LABEL, self.plane_angle),
        ]
    }

    /// Single-line summary for headless logs
    pub fn summary(&self) -> String {
        let [y_text, plane_text] = self.overlay_lines();
        match &self.invalid_reason {
            Some(reason) => format!(
                "frame {}: {} | {} | no plane ({})",
                self.frame, y_text, plane_text, reason
            ),
            None => format!(
                "frame {}: {} | {} | {} points",
                self.frame, y_text, plane_text, self.point_count
            ),
        }
    }
}

/// Consumer of loop output (renderer, logger, test probe)
pub trait FrameSink {
    /// Called once per processed frame; the returned action drives the loop
    fn on_frame(&mut self, frames: &FrameSet, report: &FrameReport) -> AppResult<LoopAction>;
}

impl<F> FrameSink for F
where
    F: FnMut(&FrameSet, &FrameReport) -> AppResult<LoopAction>,
{
    fn on_frame(&mut self, frames: &FrameSet, report: &FrameReport) -> AppResult<LoopAction> {
        self(frames, report)
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub valid_planes: u64,
}

/// The per-frame plane orientation loop
#[derive(Debug, Clone, Default)]
pub struct FrameCycle {
    options: FrameCycleOptions,
}

impl FrameCycle {
    pub fn new(options: FrameCycleOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FrameCycleOptions {
        &self.options
    }

    /// Check the ROI against the delivered stream size
    pub fn validate(&self, width: u32, height: u32) -> Result<(), ConfigError> {
        if self.options.roi.fits_within(width, height) {
            Ok(())
        } else {
            Err(ConfigError::InvalidRoi {
                roi: self.options.roi.to_string(),
                width,
                height,
            })
        }
    }

    /// Analyse one frame pair
    pub fn process(&self, frames: &FrameSet) -> FrameReport {
        let view = DepthView::from_frame(&frames.depth);
        let cloud = match view.crop(self.options.roi) {
            Some(roi_view) => extract_point_cloud(&roi_view),
            None => {
                warn!(
                    frame = frames.number,
                    roi = %self.options.roi,
                    "ROI outside the depth frame"
                );
                PointCloud::default()
            }
        };
        self.analyze(frames.number, &cloud, frames.depth_scale)
    }

    /// Fit and measure an already extracted cloud
    pub fn analyze(&self, frame: u64, cloud: &PointCloud, depth_scale: f64) -> FrameReport {
        let fit = estimate_normal(cloud);

        let plane_angle = match &fit {
            PlaneFit::Valid(plane) => angle_between(&plane.normal, &self.options.camera_vector),
            PlaneFit::Invalid(reason) => {
                debug!(frame, points = cloud.len(), %reason, "No plane in ROI");
                None
            }
        };

        let y_rotation = match self.options.y_rotation {
            YRotationSource::Assumed => y_rotation(&self.options.assumed_normal),
            YRotationSource::Fitted => fit.normal().and_then(|n| y_rotation(&n)),
        };

        FrameReport {
            frame,
            roi: self.options.roi,
            point_count: cloud.len(),
            normal: fit.normal().map(|n| [n.x, n.y, n.z]),
            invalid_reason: fit.invalid_reason().map(|r| r.to_string()),
            plane_angle,
            y_rotation,
            mean_distance_m: cloud.mean_depth().map(|d| d * depth_scale),
            fit,
        }
    }

    /// Start `pipeline`, feed every frame to `sink` until it asks to stop or
    /// the stream ends, then stop the pipeline
    pub fn run<P, S>(
        &self,
        pipeline: &mut P,
        stream: &StreamConfig,
        sink: &mut S,
    ) -> AppResult<RunSummary>
    where
        P: SensorPipeline + ?Sized,
        S: FrameSink + ?Sized,
    {
        let profile = pipeline.start(stream)?;
        info!(
            pipeline = pipeline.name(),
            stream = %profile.config,
            depth_scale = profile.depth_scale,
            roi = %self.options.roi,
            y_rotation = %self.options.y_rotation,
            "Frame cycle started"
        );

        let result = self
            .validate(profile.config.width, profile.config.height)
            .map_err(AppError::from)
            .and_then(|()| self.drive(pipeline, sink));
        pipeline.stop();

        match &result {
            Ok(summary) => info!(
                frames = summary.frames,
                valid_planes = summary.valid_planes,
                "Frame cycle finished"
            ),
            Err(e) => error!(error = %e, "Frame cycle aborted"),
        }
        result
    }

    fn drive<P, S>(&self, pipeline: &mut P, sink: &mut S) -> AppResult<RunSummary>
    where
        P: SensorPipeline + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut summary = RunSummary::default();
        loop {
            let frames = match pipeline.wait_for_frames() {
                Ok(frames) => frames,
                Err(e) if e.is_end_of_stream() => {
                    info!("End of stream");
                    return Ok(summary);
                }
                Err(e) => return Err(e.into()),
            };

            let report = self.process(&frames);
            summary.frames += 1;
            if report.is_valid() {
                summary.valid_planes += 1;
            }

            if sink.on_frame(&frames, &report)? == LoopAction::Stop {
                return Ok(summary);
            }
        }
    }
}
