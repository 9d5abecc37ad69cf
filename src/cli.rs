// SPDX-License-Identifier: GPL-3.0-only

//! Headless CLI commands
//!
//! This module provides command-line functionality for:
//! - Running the frame cycle without a display
//! - Analysing a single recorded depth frame
//! - Printing or writing the effective configuration

use depth_plane::backends::create_pipeline;
use depth_plane::backends::image_sequence::{RAW_DEPTH_EXTENSION, load_frame_pair};
use depth_plane::backends::types::{Intrinsics, StreamProfile};
use depth_plane::errors::AppResult;
use depth_plane::pipeline::{FrameCycle, FrameReport, LoopAction, OverlayState, RunSummary};
use depth_plane::{Config, FrameSet, StreamConfig};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Run the frame cycle headless, one line per frame
///
/// Stops on Ctrl+C, after `max_frames` frames, or at the end of the stream.
/// `max_frames` of zero processes nothing.
pub fn run_headless(
    config: &Config,
    max_frames: Option<u64>,
    json: bool,
) -> AppResult<RunSummary> {
    if max_frames == Some(0) {
        return Ok(RunSummary::default());
    }

    let mut pipeline = create_pipeline(config)?;
    let cycle = FrameCycle::new(config.frame_cycle_options());

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let mut overlay = OverlayState::default();
    let mut sink = |_: &FrameSet, report: &FrameReport| -> AppResult<LoopAction> {
        overlay.update(report);
        if json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            let [y_text, plane_text] = overlay.lines();
            match &report.invalid_reason {
                Some(reason) => println!(
                    "frame {:>5}  {}  {}  (no plane: {})",
                    report.frame, y_text, plane_text, reason
                ),
                None => println!(
                    "frame {:>5}  {}  {}  ({} points)",
                    report.frame, y_text, plane_text, report.point_count
                ),
            }
        }

        let limit_reached = max_frames.is_some_and(|max| report.frame + 1 >= max);
        if limit_reached || stop.load(Ordering::SeqCst) {
            Ok(LoopAction::Stop)
        } else {
            Ok(LoopAction::Continue)
        }
    };

    let summary = cycle.run(&mut pipeline, &config.stream, &mut sink)?;
    if !json {
        println!();
        println!(
            "Processed {} frames, {} with a plane",
            summary.frames, summary.valid_planes
        );
    }
    Ok(summary)
}

/// Run one recorded depth frame through the frame cycle
///
/// PNGs carry their own size; raw `.z16` dumps take the stream size.
pub fn analyze_file(config: &Config, path: &Path) -> AppResult<FrameReport> {
    let is_raw = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(RAW_DEPTH_EXTENSION));
    let expected = is_raw.then_some((config.stream.width, config.stream.height));
    let (color, depth) = load_frame_pair(path, expected)?;

    let cycle = FrameCycle::new(config.frame_cycle_options());
    cycle.validate(depth.width, depth.height)?;

    let profile = StreamProfile {
        config: StreamConfig {
            width: depth.width,
            height: depth.height,
            ..config.stream
        },
        depth_scale: config.depth_scale,
        intrinsics: Intrinsics::kinect_default(depth.width, depth.height),
    };
    debug!(path = %path.display(), stream = %profile.config, "Analysing depth frame");
    let frames = config.post_processing().finish(0, color, depth, &profile);
    Ok(cycle.process(&frames))
}

/// Analyse one recorded depth frame (16-bit PNG or raw `.z16`)
pub fn analyze(config: &Config, path: &Path, json: bool) -> AppResult<()> {
    let report = analyze_file(config, path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", path.display());
    println!("ROI: {} ({} points)", report.roi, report.point_count);
    match (&report.normal, &report.invalid_reason) {
        (Some([x, y, z]), _) => println!("Normal: ({:.4}, {:.4}, {:.4})", x, y, z),
        (None, Some(reason)) => println!("No plane: {}", reason),
        (None, None) => {}
    }
    if let Some(distance) = report.mean_distance_m {
        println!("Mean distance: {:.3} m", distance);
    }
    for line in report.overlay_lines() {
        println!("{}", line);
    }
    Ok(())
}

/// Print the effective configuration, or write it to `path`
pub fn show_config(config: &Config, path: Option<&Path>, write: bool) -> AppResult<()> {
    if write {
        let path = path.ok_or("no config path available")?;
        config.save(path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    if let Some(path) = path {
        eprintln!("# {}", path.display());
    }
    println!("{}", config.to_json()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_plane::backends::synthetic::SyntheticScene;
    use depth_plane::{Roi, SourceKind, YRotationSource};
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "depth-plane-cli-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn synthetic_config() -> Config {
        Config {
            source: SourceKind::Synthetic,
            synthetic: SyntheticScene::still(30.0, 0.0),
            stream: StreamConfig {
                width: 160,
                height: 120,
                ..StreamConfig::default()
            },
            roi: Roi::new(40, 30, 80, 60),
            ..Config::default()
        }
    }

    #[test]
    fn test_headless_run_stops_at_frame_limit() {
        let config = synthetic_config();
        let summary = run_headless(&config, Some(3), true).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.valid_planes, 3);
    }

    #[test]
    fn test_headless_run_with_zero_limit_processes_nothing() {
        let summary = run_headless(&synthetic_config(), Some(0), true).unwrap();
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn test_analyze_tilted_png() {
        let dir = temp_dir("analyze");
        let path = dir.join("tilted.png");
        let depth = SyntheticScene::still(30.0, 0.0).render_depth(64, 48, 0);
        let image: image::ImageBuffer<image::Luma<u16>, Vec<u16>> =
            image::ImageBuffer::from_raw(depth.width, depth.height, depth.data).unwrap();
        image.save(&path).unwrap();

        let config = Config {
            roi: Roi::new(8, 8, 40, 30),
            y_rotation: YRotationSource::Fitted,
            ..Config::default()
        };
        let report = analyze_file(&config, &path).unwrap();

        assert_eq!(report.point_count, 1200);
        let angle = report.plane_angle.unwrap();
        assert!(
            (angle - 30.0).abs() < 1.0 || (angle - 150.0).abs() < 1.0,
            "angle {}",
            angle
        );
        assert!((report.y_rotation.unwrap() - 90.0).abs() < 1.0);
        assert!(report.mean_distance_m.is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_analyze_rejects_roi_outside_frame() {
        let dir = temp_dir("analyze-roi");
        let path = dir.join("small.png");
        let image = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_pixel(
            16,
            12,
            image::Luma([1000]),
        );
        image.save(&path).unwrap();

        let config = Config {
            roi: Roi::new(8, 8, 40, 30),
            ..Config::default()
        };
        assert!(analyze_file(&config, &path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
