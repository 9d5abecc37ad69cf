// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the plane estimator

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Sensor pipeline errors
    Sensor(SensorError),
    /// Configuration errors
    Config(ConfigError),
    /// Storage/filesystem errors
    Storage(String),
    /// Terminal/display errors
    Display(String),
    /// Generic error with message
    Other(String),
}

/// Sensor pipeline errors
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Pipeline could not be started with the requested stream configuration
    StartFailed(String),
    /// Frames requested before `start`
    NotStarted,
    /// Frame acquisition failed
    Acquisition(String),
    /// An acquired frame carried no data
    EmptyFrame,
    /// Recorded source has no more frames
    EndOfStream,
    /// Frame data in an unsupported format
    InvalidFormat(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Config file could not be read
    Read(String),
    /// Config file is not valid JSON for [`crate::Config`]
    Parse(String),
    /// ROI does not fit inside the depth stream
    InvalidRoi {
        roi: String,
        width: u32,
        height: u32,
    },
    /// Any other invalid value
    Invalid(String),
}

impl SensorError {
    /// Whether the loop should end without reporting a failure
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, SensorError::EndOfStream)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Sensor(e) => write!(f, "Sensor error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Display(msg) => write!(f, "Display error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::StartFailed(msg) => write!(f, "Failed to start pipeline: {}", msg),
            SensorError::NotStarted => write!(f, "Pipeline not started"),
            SensorError::Acquisition(msg) => write!(f, "Frame acquisition failed: {}", msg),
            SensorError::EmptyFrame => write!(f, "Acquired frame is empty"),
            SensorError::EndOfStream => write!(f, "End of stream"),
            SensorError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidRoi { roi, width, height } => {
                write!(f, "ROI {} does not fit inside {}x{} frame", roi, width, height)
            }
            ConfigError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SensorError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to AppError
impl From<SensorError> for AppError {
    fn from(err: SensorError) -> Self {
        AppError::Sensor(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::Acquisition(err.to_string())
    }
}
