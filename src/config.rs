// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `<config dir>/depth-plane/config.json`. Every field has
//! a default, so a partial file (or none at all) is fine. Command-line
//! options are applied on top after loading.

use crate::backends::SourceKind;
use crate::backends::colorize::Colorizer;
use crate::backends::filters::{HoleFillingMode, PostProcessing};
use crate::backends::synthetic::SyntheticScene;
use crate::backends::types::StreamConfig;
use crate::constants::{
    APP_NAME, ASSUMED_PLANE_NORMAL, CAMERA_VECTOR, COLORIZE_MAX_M, COLORIZE_MIN_M, CONFIG_FILE_NAME,
    DEFAULT_DEPTH_SCALE, DEFAULT_ROI, SNAPSHOT_FOLDER,
};
use crate::errors::ConfigError;
use crate::geometry::Roi;
use crate::pipeline::{FrameCycleOptions, YRotationSource};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Vectors shorter than this cannot serve as a reference direction
const MIN_REFERENCE_NORM: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame source
    pub source: SourceKind,
    /// Directory read by the image-sequence source
    pub input_dir: Option<PathBuf>,
    /// Restart the image sequence when it ends
    pub loop_playback: bool,
    /// Kinect device index
    pub kinect_device: usize,
    /// Requested stream
    pub stream: StreamConfig,
    /// Region analysed every frame
    pub roi: Roi,
    /// Reference axis for the plane angle
    pub camera_vector: [f64; 3],
    /// Source of the Y-rotation readout
    pub y_rotation: YRotationSource,
    /// Normal used for the Y rotation in `assumed` mode
    pub assumed_normal: [f64; 3],
    /// Hole filling applied by the pipeline; `null` disables it
    pub hole_filling: Option<HoleFillingMode>,
    /// Colorizer range in metres
    pub colorize_min_m: f32,
    pub colorize_max_m: f32,
    /// Metres per raw depth unit for recorded frames
    pub depth_scale: f64,
    /// Synthetic scene settings
    pub synthetic: SyntheticScene,
    /// Where snapshots go; defaults to the pictures folder
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let (x, y, width, height) = DEFAULT_ROI;
        Self {
            source: SourceKind::default(),
            input_dir: None,
            loop_playback: false,
            kinect_device: 0,
            stream: StreamConfig::default(),
            roi: Roi::new(x, y, width, height),
            camera_vector: CAMERA_VECTOR,
            y_rotation: YRotationSource::default(),
            assumed_normal: ASSUMED_PLANE_NORMAL,
            hole_filling: Some(HoleFillingMode::default()),
            colorize_min_m: COLORIZE_MIN_M,
            colorize_max_m: COLORIZE_MAX_M,
            depth_scale: DEFAULT_DEPTH_SCALE,
            synthetic: SyntheticScene::default(),
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// `<config dir>/depth-plane/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Read(format!("{}: {}", path.display(), e))),
        };

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location, or defaults when there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write as pretty JSON, creating parent folders
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Read(format!("{}: {}", parent.display(), e)))?;
        }
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check values that would make every frame meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.roi.fits_within(self.stream.width, self.stream.height) {
            return Err(ConfigError::InvalidRoi {
                roi: self.roi.to_string(),
                width: self.stream.width,
                height: self.stream.height,
            });
        }

        check_reference("camera_vector", &self.camera_vector)?;
        // The assumed normal may legitimately project to nothing; it only has to be finite
        if self.assumed_normal.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid(
                "assumed_normal must be finite".to_string(),
            ));
        }

        if !(self.colorize_min_m.is_finite()
            && self.colorize_max_m.is_finite()
            && self.colorize_min_m >= 0.0
            && self.colorize_min_m < self.colorize_max_m)
        {
            return Err(ConfigError::Invalid(format!(
                "colorize range {}..{} m is empty",
                self.colorize_min_m, self.colorize_max_m
            )));
        }

        if !(self.depth_scale.is_finite() && self.depth_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "depth_scale must be positive, got {}",
                self.depth_scale
            )));
        }

        Ok(())
    }

    /// Post-processing chain handed to the pipeline
    pub fn post_processing(&self) -> PostProcessing {
        PostProcessing::new(
            self.hole_filling,
            Colorizer::new(self.colorize_min_m, self.colorize_max_m),
        )
    }

    pub fn frame_cycle_options(&self) -> FrameCycleOptions {
        FrameCycleOptions {
            roi: self.roi,
            camera_vector: Vector3::from(self.camera_vector),
            y_rotation: self.y_rotation,
            assumed_normal: Vector3::from(self.assumed_normal),
        }
    }

    /// Snapshot folder, falling back to `<pictures>/depth-plane`
    pub fn snapshot_directory(&self) -> PathBuf {
        if let Some(dir) = &self.snapshot_dir {
            return dir.clone();
        }
        dirs::picture_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SNAPSHOT_FOLDER)
    }
}

fn check_reference(name: &str, v: &[f64; 3]) -> Result<(), ConfigError> {
    let norm = Vector3::from(*v).norm();
    if !norm.is_finite() || norm < MIN_REFERENCE_NORM {
        return Err(ConfigError::Invalid(format!(
            "{} must be a finite non-zero vector",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_cycle_options(), FrameCycleOptions::default());
    }

    #[test]
    fn test_roi_outside_stream_is_rejected() {
        let config = Config {
            roi: Roi::new(500, 400, 200, 100),
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidRoi {
                roi: "500,400 200x100".to_string(),
                width: 640,
                height: 480,
            })
        );
    }

    #[test]
    fn test_zero_camera_vector_is_rejected() {
        let config = Config {
            camera_vector: [0.0; 3],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "roi": { "x": 0, "y": 0, "width": 10, "height": 10 } }"#)
                .unwrap();
        assert_eq!(config.roi, Roi::new(0, 0, 10, 10));
        assert_eq!(config.source, SourceKind::Synthetic);
        assert_eq!(config.hole_filling, Some(HoleFillingMode::FarestFromAround));
    }

    #[test]
    fn test_snapshot_dir_override() {
        let config = Config {
            snapshot_dir: Some(PathBuf::from("/tmp/snaps")),
            ..Config::default()
        };
        assert_eq!(config.snapshot_directory(), PathBuf::from("/tmp/snaps"));
    }
}
