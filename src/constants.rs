// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Application identifier used for config, cache and snapshot folders
pub const APP_NAME: &str = "depth-plane";

/// Config file name inside the application config folder
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Log file name used in terminal mode (stdout belongs to the viewer)
pub const LOG_FILE_NAME: &str = "depth-plane.log";

/// Default stream resolution and frame rate
pub const DEFAULT_STREAM_WIDTH: u32 = 640;
pub const DEFAULT_STREAM_HEIGHT: u32 = 480;
pub const DEFAULT_STREAM_FPS: u32 = 30;

/// Fixed region of interest analysed every frame (x, y, width, height)
pub const DEFAULT_ROI: (u32, u32, u32, u32) = (200, 100, 240, 200);

/// Camera viewing axis used for the plane angle
pub const CAMERA_VECTOR: [f64; 3] = [0.0, 0.0, -1.0];

/// Normal assumed for the Y-rotation readout when it is not taken from the fit
pub const ASSUMED_PLANE_NORMAL: [f64; 3] = [0.0, 0.0, -1.0];

/// Metres per raw depth unit for millimetre-based sources
pub const DEFAULT_DEPTH_SCALE: f64 = 0.001;

/// Colorizer range (metres)
pub const COLORIZE_MIN_M: f32 = 0.3;
pub const COLORIZE_MAX_M: f32 = 4.0;

/// ROI outline colour (BGR) and thickness in pixels
pub const ROI_COLOR_BGR: [u8; 3] = [0, 255, 0];
pub const ROI_THICKNESS: u32 = 2;

/// Overlay text labels
pub const Y_ROTATION_LABEL: &str = "Y Rotation";
pub const PLANE_ANGLE_LABEL: &str = "Plane Angle";

/// Snapshot folder inside the user's pictures directory
pub const SNAPSHOT_FOLDER: &str = "depth-plane";

/// Synthetic scene defaults
pub const SYNTHETIC_BASE_DEPTH_MM: f64 = 1000.0;
pub const SYNTHETIC_TILT_DEG: f64 = 30.0;
pub const SYNTHETIC_DROPOUT_PERIOD: u32 = 17;
