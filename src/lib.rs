// SPDX-License-Identifier: GPL-3.0-only

//! Depth Plane - real-time orientation of a planar surface seen by a depth sensor
//!
//! Every frame, a fixed region of interest of the depth image is turned into
//! a point cloud, a plane is fitted to it by principal component analysis,
//! and the angle of its normal is reported.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`geometry`]: point cloud extraction, plane fit and angle math
//! - [`backends`]: sensor pipelines delivering aligned colour/depth frames
//! - [`pipeline`]: the per-frame orchestrator and its overlay output
//! - [`config`]: user configuration handling
//! - [`terminal`]: terminal viewer
//!
//! # Example
//!
//! ```no_run
//! use depth_plane::backends::synthetic::{SyntheticPipeline, SyntheticScene};
//! use depth_plane::pipeline::{FrameCycle, FrameCycleOptions, LoopAction};
//! use depth_plane::{FrameReport, FrameSet, StreamConfig};
//!
//! let mut pipeline = SyntheticPipeline::new(SyntheticScene::default(), Default::default());
//! let cycle = FrameCycle::new(FrameCycleOptions::default());
//! let mut sink = |_: &FrameSet, report: &FrameReport| -> depth_plane::AppResult<LoopAction> {
//!     println!("{}", report.summary());
//!     Ok(LoopAction::Stop)
//! };
//! cycle.run(&mut pipeline, &StreamConfig::default(), &mut sink)?;
//! # Ok::<(), depth_plane::AppError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod geometry;
pub mod pipeline;
pub mod terminal;

// Re-export commonly used types
pub use backends::types::{FrameSet, StreamConfig};
pub use backends::{SensorPipeline, SourceKind};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use geometry::{PlaneFit, Roi};
pub use pipeline::{FrameCycle, FrameReport, LoopAction, YRotationSource};
