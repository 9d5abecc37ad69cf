// SPDX-License-Identifier: GPL-3.0-only

//! Recorded depth frames played back from a directory
//!
//! Depth frames are either 16-bit grayscale PNGs or raw `.z16` dumps
//! (little-endian `u16`, dimensions taken from the stream configuration).
//! A colour image named `<stem>.color.png` next to a depth frame is used as
//! its colour buffer; otherwise a grey rendering of the depth is shown.
//! Frames play in file-name order.

use super::filters::PostProcessing;
use super::types::{
    ColorFormat, ColorFrame, DepthFrame, FrameSet, Intrinsics, StreamConfig, StreamProfile,
};
use super::{SensorPipeline, SensorResult};
use crate::errors::SensorError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of companion colour images
pub const COLOR_SUFFIX: &str = ".color.png";

/// Extension of raw depth dumps
pub const RAW_DEPTH_EXTENSION: &str = "z16";

/// Whether `path` names a depth frame this source can read
pub fn is_depth_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.ends_with(COLOR_SUFFIX) {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            ext.eq_ignore_ascii_case("png") || ext.eq_ignore_ascii_case(RAW_DEPTH_EXTENSION)
        })
}

/// Sorted depth frames in `dir`
pub fn list_depth_files(dir: &Path) -> SensorResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        SensorError::StartFailed(format!("cannot read {}: {}", dir.display(), e))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_depth_file(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Read one depth frame
///
/// PNGs must be 16-bit grayscale. Raw dumps need `expected` dimensions.
pub fn load_depth_file(path: &Path, expected: Option<(u32, u32)>) -> SensorResult<DepthFrame> {
    let is_raw = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(RAW_DEPTH_EXTENSION));

    let frame = if is_raw {
        let (width, height) = expected.ok_or_else(|| {
            SensorError::InvalidFormat(format!(
                "{}: raw depth needs frame dimensions",
                path.display()
            ))
        })?;
        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(SensorError::EmptyFrame);
        }
        if bytes.len() != width as usize * height as usize * 2 {
            return Err(SensorError::Acquisition(format!(
                "{}: {} bytes is not a {}x{} Z16 frame",
                path.display(),
                bytes.len(),
                width,
                height
            )));
        }
        let mut samples: Vec<u16> = bytemuck::pod_collect_to_vec(&bytes);
        for sample in samples.iter_mut() {
            *sample = u16::from_le(*sample);
        }
        DepthFrame::from_raw(width, height, samples).ok_or(SensorError::EmptyFrame)?
    } else {
        let image = image::open(path)
            .map_err(|e| SensorError::Acquisition(format!("{}: {}", path.display(), e)))?;
        let color_type = image.color();
        let DynamicImage::ImageLuma16(gray) = image else {
            return Err(SensorError::InvalidFormat(format!(
                "{}: expected 16-bit grayscale depth, got {:?}",
                path.display(),
                color_type
            )));
        };
        let (width, height) = gray.dimensions();
        DepthFrame::from_raw(width, height, gray.into_raw()).ok_or(SensorError::EmptyFrame)?
    };

    if frame.is_empty() {
        return Err(SensorError::EmptyFrame);
    }
    if let Some((width, height)) = expected
        && (frame.width, frame.height) != (width, height)
    {
        return Err(SensorError::Acquisition(format!(
            "{}: frame is {}x{}, stream is {}x{}",
            path.display(),
            frame.width,
            frame.height,
            width,
            height
        )));
    }
    Ok(frame)
}

/// Read a depth frame with its companion colour image, or a grey rendering
/// of the depth when there is none
pub fn load_frame_pair(
    path: &Path,
    expected: Option<(u32, u32)>,
) -> SensorResult<(ColorFrame, DepthFrame)> {
    let depth = load_depth_file(path, expected)?;
    let color = color_path_for(path)
        .filter(|p| p.is_file())
        .and_then(|p| load_color(&p, depth.width, depth.height))
        .unwrap_or_else(|| depth_as_gray(&depth));
    Ok((color, depth))
}

/// Companion colour image path for a depth frame
pub fn color_path_for(depth_path: &Path) -> Option<PathBuf> {
    let stem = depth_path.file_stem()?.to_str()?;
    Some(depth_path.with_file_name(format!("{}{}", stem, COLOR_SUFFIX)))
}

fn load_color(path: &Path, width: u32, height: u32) -> Option<ColorFrame> {
    let image = match image::open(path) {
        Ok(image) => image.into_rgb8(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read colour image");
            return None;
        }
    };
    if image.dimensions() != (width, height) {
        warn!(
            path = %path.display(),
            "Colour image size does not match depth, ignoring it"
        );
        return None;
    }
    let rgb = ColorFrame::from_raw(width, height, ColorFormat::Rgb8, image.into_raw())?;
    Some(rgb.to_format(ColorFormat::Bgr8))
}

/// Grey rendering of depth used when no colour image exists
pub(crate) fn depth_as_gray(depth: &DepthFrame) -> ColorFrame {
    let max = depth.data.iter().copied().max().unwrap_or(0).max(1) as u32;
    let mut color = ColorFrame::new(depth.width, depth.height, ColorFormat::Bgr8);
    for (px, &d) in color.data.chunks_exact_mut(3).zip(&depth.data) {
        let v = if d == 0 {
            0
        } else {
            (255 - (d as u32 * 200 / max)) as u8
        };
        px.copy_from_slice(&[v, v, v]);
    }
    color
}

/// Pipeline replaying depth frames from a directory
pub struct ImageSequencePipeline {
    dir: PathBuf,
    loop_playback: bool,
    depth_scale: f64,
    post: PostProcessing,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_number: u64,
    profile: Option<StreamProfile>,
}

impl ImageSequencePipeline {
    pub fn new(dir: PathBuf, loop_playback: bool, depth_scale: f64, post: PostProcessing) -> Self {
        Self {
            dir,
            loop_playback,
            depth_scale,
            post,
            files: Vec::new(),
            cursor: 0,
            frame_number: 0,
            profile: None,
        }
    }

    /// Number of depth frames found at start
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SensorPipeline for ImageSequencePipeline {
    fn start(&mut self, config: &StreamConfig) -> SensorResult<StreamProfile> {
        let files = list_depth_files(&self.dir)?;
        if files.is_empty() {
            return Err(SensorError::StartFailed(format!(
                "no depth frames in {}",
                self.dir.display()
            )));
        }

        info!(
            dir = %self.dir.display(),
            frames = files.len(),
            looping = self.loop_playback,
            "Starting image sequence pipeline"
        );

        let profile = StreamProfile {
            config: *config,
            depth_scale: self.depth_scale,
            intrinsics: Intrinsics::kinect_default(config.width, config.height),
        };
        self.files = files;
        self.cursor = 0;
        self.frame_number = 0;
        self.profile = Some(profile);
        Ok(profile)
    }

    fn wait_for_frames(&mut self) -> SensorResult<FrameSet> {
        let profile = self.profile.ok_or(SensorError::NotStarted)?;

        if self.cursor >= self.files.len() {
            if !self.loop_playback {
                return Err(SensorError::EndOfStream);
            }
            debug!("Image sequence wrapped around");
            self.cursor = 0;
        }

        let path = self.files[self.cursor].clone();
        self.cursor += 1;

        let size = (profile.config.width, profile.config.height);
        let (color, depth) = load_frame_pair(&path, Some(size))?;

        let number = self.frame_number;
        self.frame_number += 1;
        debug!(frame = number, path = %path.display(), "Loaded depth frame");

        Ok(self.post.finish(number, color, depth, &profile))
    }

    fn stop(&mut self) {
        if self.profile.take().is_some() {
            info!(frames = self.frame_number, "Image sequence pipeline stopped");
        }
    }

    fn name(&self) -> &str {
        "images"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "depth-plane-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, width: u32, height: u32, value: u16) {
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_pixel(
            width,
            height,
            image::Luma([value]),
        );
        img.save(path).unwrap();
    }

    fn pipeline(dir: &Path, loop_playback: bool) -> ImageSequencePipeline {
        ImageSequencePipeline::new(
            dir.to_path_buf(),
            loop_playback,
            0.001,
            PostProcessing::default(),
        )
    }

    fn small_stream() -> StreamConfig {
        StreamConfig {
            width: 8,
            height: 6,
            ..StreamConfig::default()
        }
    }

    #[test]
    fn test_depth_file_filter() {
        assert!(is_depth_file(Path::new("a/frame_001.png")));
        assert!(is_depth_file(Path::new("frame.Z16")));
        assert!(!is_depth_file(Path::new("frame_001.color.png")));
        assert!(!is_depth_file(Path::new("notes.txt")));
        assert_eq!(
            color_path_for(Path::new("/d/frame_7.png")),
            Some(PathBuf::from("/d/frame_7.color.png"))
        );
    }

    #[test]
    fn test_plays_png_and_raw_in_order_then_ends() {
        let dir = temp_dir("sequence");
        write_png(&dir.join("a.png"), 8, 6, 1200);
        let raw: Vec<u8> = (0..48u16).flat_map(|_| 900u16.to_le_bytes()).collect();
        std::fs::write(dir.join("b.z16"), raw).unwrap();

        let mut pipeline = pipeline(&dir, false);
        pipeline.start(&small_stream()).unwrap();
        assert_eq!(pipeline.len(), 2);

        let first = pipeline.wait_for_frames().unwrap();
        assert!(first.depth.data.iter().all(|&d| d == 1200));
        let second = pipeline.wait_for_frames().unwrap();
        assert!(second.depth.data.iter().all(|&d| d == 900));
        assert_eq!(second.number, 1);
        assert_eq!(
            pipeline.wait_for_frames().unwrap_err(),
            SensorError::EndOfStream
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_loop_playback_restarts() {
        let dir = temp_dir("loop");
        write_png(&dir.join("only.png"), 8, 6, 700);

        let mut pipeline = pipeline(&dir, true);
        pipeline.start(&small_stream()).unwrap();
        for expected in 0..3 {
            assert_eq!(pipeline.wait_for_frames().unwrap().number, expected);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_mismatched_size_is_acquisition_error() {
        let dir = temp_dir("mismatch");
        write_png(&dir.join("big.png"), 10, 6, 700);

        let mut pipeline = pipeline(&dir, false);
        pipeline.start(&small_stream()).unwrap();
        assert!(matches!(
            pipeline.wait_for_frames(),
            Err(SensorError::Acquisition(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_directory_fails_to_start() {
        let dir = temp_dir("empty");
        let mut pipeline = pipeline(&dir, false);
        assert!(matches!(
            pipeline.start(&small_stream()),
            Err(SensorError::StartFailed(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_eight_bit_png_is_rejected() {
        let dir = temp_dir("eightbit");
        let path = dir.join("gray8.png");
        image::GrayImage::from_pixel(8, 6, image::Luma([10])).save(&path).unwrap();
        assert!(matches!(
            load_depth_file(&path, None),
            Err(SensorError::InvalidFormat(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
