// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end plane orientation scenarios

use depth_plane::backends::filters::{HoleFillingMode, PostProcessing};
use depth_plane::backends::image_sequence::ImageSequencePipeline;
use depth_plane::backends::synthetic::{SyntheticPipeline, SyntheticScene};
use depth_plane::backends::types::DepthFrame;
use depth_plane::geometry::{
    DepthView, PlaneFit, angle_between, angle_from_cosine, estimate_normal, extract_point_cloud,
    y_rotation,
};
use depth_plane::pipeline::{FrameCycleOptions, OverlayState};
use depth_plane::{
    AppResult, FrameCycle, FrameReport, FrameSet, LoopAction, Roi, StreamConfig, YRotationSource,
};
use nalgebra::Vector3;

fn stream(width: u32, height: u32) -> StreamConfig {
    StreamConfig {
        width,
        height,
        ..StreamConfig::default()
    }
}

fn cycle(roi: Roi, y_rotation: YRotationSource) -> FrameCycle {
    FrameCycle::new(FrameCycleOptions {
        roi,
        y_rotation,
        ..FrameCycleOptions::default()
    })
}

/// Run `frames` frames of `scene` and collect the reports
fn run_scene(scene: SyntheticScene, cycle: &FrameCycle, frames: usize) -> Vec<FrameReport> {
    let post = PostProcessing::new(Some(HoleFillingMode::FarestFromAround), Default::default());
    let mut pipeline = SyntheticPipeline::new(scene, post);
    let mut reports = Vec::new();
    let mut sink = |_: &FrameSet, report: &FrameReport| -> AppResult<LoopAction> {
        reports.push(report.clone());
        Ok(if reports.len() >= frames {
            LoopAction::Stop
        } else {
            LoopAction::Continue
        })
    };
    cycle.run(&mut pipeline, &stream(160, 120), &mut sink).unwrap();
    reports
}

fn near(angle: f64, targets: &[f64], tolerance: f64) -> bool {
    targets.iter().any(|t| (angle - t).abs() <= tolerance)
}

#[test]
fn test_fronto_parallel_plane() {
    let depth = DepthFrame::from_raw(40, 30, vec![1000; 1200]).unwrap();
    let cloud = extract_point_cloud(&DepthView::from_frame(&depth));
    let PlaneFit::Valid(plane) = estimate_normal(&cloud) else {
        panic!("flat plane must fit");
    };

    assert!((plane.normal.z.abs() - 1.0).abs() < 1e-9);
    let angle = angle_between(&plane.normal, &Vector3::new(0.0, 0.0, -1.0)).unwrap();
    assert!(near(angle, &[0.0, 180.0], 1e-6), "angle {}", angle);
}

#[test]
fn test_tilted_plane_reads_thirty_degrees() {
    let roi = Roi::new(40, 30, 80, 60);
    let reports = run_scene(
        SyntheticScene::still(30.0, 0.0),
        &cycle(roi, YRotationSource::Fitted),
        2,
    );

    for report in &reports {
        let angle = report.plane_angle.unwrap();
        assert!(near(angle, &[30.0, 150.0], 1.0), "angle {}", angle);
        // Rotation about the vertical axis puts the normal in the X-Z plane
        let y = report.y_rotation.unwrap();
        assert!(near(y, &[90.0], 1.0), "y rotation {}", y);
    }
}

#[test]
fn test_dropouts_do_not_change_the_angle() {
    let scene = SyntheticScene {
        dropout_period: 5,
        realtime: false,
        ..SyntheticScene::still(20.0, 10.0)
    };
    let roi = Roi::new(20, 20, 100, 80);
    let reports = run_scene(scene, &cycle(roi, YRotationSource::Assumed), 3);

    for report in &reports {
        assert_eq!(report.point_count, 8000, "holes are filled before the fit");
        assert!(report.plane_angle.is_some());
        // Default assumed normal (0, 0, -1) has no X-Y component
        assert_eq!(report.y_rotation, None);
    }
}

#[test]
fn test_same_roi_twice_gives_same_normal() {
    let depth = SyntheticScene::still(25.0, -12.0).render_depth(64, 48, 0);
    let cycle = cycle(Roi::new(8, 8, 40, 30), YRotationSource::Fitted);
    let view = DepthView::from_frame(&depth);
    let roi_view = view.crop(cycle.options().roi).unwrap();

    let first = cycle.analyze(0, &extract_point_cloud(&roi_view), 0.001);
    let second = cycle.analyze(1, &extract_point_cloud(&roi_view), 0.001);

    let a = Vector3::from(first.normal.unwrap());
    let b = Vector3::from(second.normal.unwrap());
    assert!((a.dot(&b).abs() - 1.0).abs() < 1e-12);
    assert_eq!(first.plane_angle, second.plane_angle);
}

#[test]
fn test_all_zero_roi_keeps_last_overlay_value() {
    let dir = std::env::temp_dir().join(format!("depth-plane-scenario-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    // A tilted frame followed by an empty one
    let tilted = SyntheticScene::still(30.0, 0.0).render_depth(32, 24, 0);
    let empty = DepthFrame::new(32, 24);
    for (name, frame) in [("a.png", &tilted), ("b.png", &empty)] {
        let image: image::ImageBuffer<image::Luma<u16>, Vec<u16>> =
            image::ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone()).unwrap();
        image.save(dir.join(name)).unwrap();
    }

    let mut pipeline =
        ImageSequencePipeline::new(dir.clone(), false, 0.001, PostProcessing::default());
    let cycle = cycle(Roi::new(4, 4, 24, 16), YRotationSource::Fitted);
    let mut overlay = OverlayState::default();
    let mut reports = Vec::new();
    let mut sink = |_: &FrameSet, report: &FrameReport| -> AppResult<LoopAction> {
        overlay.update(report);
        reports.push(report.clone());
        Ok(LoopAction::Continue)
    };
    let summary = cycle.run(&mut pipeline, &stream(32, 24), &mut sink).unwrap();

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.valid_planes, 1);
    assert_eq!(reports[1].point_count, 0);
    assert_eq!(reports[1].plane_angle, None);
    // The empty frame leaves the tilted frame's reading on screen
    assert_eq!(overlay.plane_angle(), reports[0].plane_angle);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cosine_clamp_and_degenerate_y_rotation() {
    assert_eq!(angle_from_cosine(1.0000001), 0.0);
    assert_eq!(angle_from_cosine(-1.0000001), 180.0);
    assert_eq!(y_rotation(&Vector3::new(0.0, 0.0, -1.0)), None);
}
