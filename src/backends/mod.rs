// SPDX-License-Identifier: GPL-3.0-only

//! Sensor pipeline abstraction
//!
//! A pipeline is started once with a [`StreamConfig`] and then hands out
//! aligned, hole-filled colour/depth frame pairs, one blocking call at a time.
//!
//! Available pipelines:
//!
//! - [`synthetic`]: generated tilted plane (no hardware needed)
//! - [`image_sequence`]: recorded depth frames from a directory
//! - `kinect`: Kinect v1 through freedepth (feature `kinect`, x86_64 only)

pub mod colorize;
pub mod filters;
pub mod image_sequence;
#[cfg(all(target_arch = "x86_64", feature = "kinect"))]
pub mod kinect;
pub mod registration;
pub mod synthetic;
pub mod types;

use crate::config::Config;
use crate::errors::SensorError;
use serde::{Deserialize, Serialize};
use types::{FrameSet, StreamConfig, StreamProfile};

/// Result type for pipeline operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Source of aligned colour/depth frame pairs
pub trait SensorPipeline {
    /// Start streaming with the requested configuration
    ///
    /// Failure here is fatal: no frames can ever be produced.
    fn start(&mut self, config: &StreamConfig) -> SensorResult<StreamProfile>;

    /// Block until the next frame pair is available
    fn wait_for_frames(&mut self) -> SensorResult<FrameSet>;

    /// Stop streaming and release the device
    fn stop(&mut self);

    /// Human-readable pipeline name for logs
    fn name(&self) -> &str;
}

impl<P: SensorPipeline + ?Sized> SensorPipeline for Box<P> {
    fn start(&mut self, config: &StreamConfig) -> SensorResult<StreamProfile> {
        (**self).start(config)
    }

    fn wait_for_frames(&mut self) -> SensorResult<FrameSet> {
        (**self).wait_for_frames()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Which pipeline to build
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Generated tilted plane
    #[default]
    Synthetic,
    /// Depth images from a directory
    Images,
    /// Kinect v1 via freedepth
    Kinect,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Synthetic => write!(f, "synthetic"),
            SourceKind::Images => write!(f, "images"),
            SourceKind::Kinect => write!(f, "kinect"),
        }
    }
}

/// Build the pipeline selected in `config` (not yet started)
pub fn create_pipeline(config: &Config) -> SensorResult<Box<dyn SensorPipeline>> {
    let post = config.post_processing();

    match config.source {
        SourceKind::Synthetic => Ok(Box::new(synthetic::SyntheticPipeline::new(
            config.synthetic,
            post,
        ))),
        SourceKind::Images => {
            let dir = config.input_dir.clone().ok_or_else(|| {
                SensorError::StartFailed("image source needs an input directory".to_string())
            })?;
            Ok(Box::new(image_sequence::ImageSequencePipeline::new(
                dir,
                config.loop_playback,
                config.depth_scale,
                post,
            )))
        }
        #[cfg(all(target_arch = "x86_64", feature = "kinect"))]
        SourceKind::Kinect => Ok(Box::new(kinect::KinectPipeline::new(
            config.kinect_device,
            post,
        ))),
        #[cfg(not(all(target_arch = "x86_64", feature = "kinect")))]
        SourceKind::Kinect => Err(SensorError::StartFailed(
            "Kinect support not compiled in (enable the `kinect` feature)".to_string(),
        )),
    }
}
