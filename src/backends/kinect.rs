// SPDX-License-Identifier: GPL-3.0-only

#![cfg(all(target_arch = "x86_64", feature = "kinect"))]

//! Kinect v1 pipeline through freedepth
//!
//! Streams Bayer video and 11-bit depth over USB, bypassing V4L2. Raw depth
//! is converted to millimetres with the device-calibrated lookup table, so
//! the reported depth scale is 0.001 m per unit.
//!
//! Only 640x480 is supported. Colour is resampled onto the depth grid with
//! the device's registration tables, so the ROI drawn on the colour frame
//! covers the pixels that are measured.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use freedepth::{DepthRegistration, KinectStreamer, Resolution, VideoFormat, VideoFrame};
use tracing::{debug, info, warn};

use super::filters::PostProcessing;
use super::image_sequence::depth_as_gray;
use super::registration::ColorRegistration;
use super::types::{
    ColorFormat, ColorFrame, DepthFrame, FrameSet, Intrinsics, StreamConfig, StreamProfile,
};
use super::{SensorPipeline, SensorResult};
use crate::constants::DEFAULT_DEPTH_SCALE;
use crate::errors::SensorError;

const KINECT_WIDTH: u32 = 640;
const KINECT_HEIGHT: u32 = 480;

/// How long to wait for a depth frame before giving up
const DEPTH_TIMEOUT: Duration = Duration::from_secs(2);

struct Streams {
    streamer: KinectStreamer,
    video_rx: Receiver<VideoFrame>,
    depth_rx: Receiver<freedepth::DepthFrame>,
    converter: freedepth::DepthToMm,
    registration: ColorRegistration,
}

/// Pipeline reading a Kinect v1
pub struct KinectPipeline {
    device_index: usize,
    post: PostProcessing,
    streams: Option<Streams>,
    profile: Option<StreamProfile>,
    last_color: Option<ColorFrame>,
    frame_number: u64,
}

impl KinectPipeline {
    pub fn new(device_index: usize, post: PostProcessing) -> Self {
        Self {
            device_index,
            post,
            streams: None,
            profile: None,
            last_color: None,
            frame_number: 0,
        }
    }

    /// Newest video frame converted to BGR, keeping the previous one if none arrived
    fn drain_video(&mut self) -> SensorResult<()> {
        let Some(streams) = self.streams.as_ref() else {
            return Err(SensorError::NotStarted);
        };

        let mut newest = None;
        loop {
            match streams.video_rx.try_recv() {
                Ok(frame) => newest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(SensorError::Acquisition(
                        "video stream disconnected".to_string(),
                    ));
                }
            }
        }

        if let Some(frame) = newest {
            let mut rgb = vec![0u8; frame.width as usize * frame.height as usize * 3];
            freedepth::convert_bayer_to_rgb(&frame.data, &mut rgb, frame.width, frame.height);
            let color = ColorFrame::from_raw(frame.width, frame.height, ColorFormat::Rgb8, rgb);
            if let Some(color) = color {
                self.last_color = Some(color.to_format(ColorFormat::Bgr8));
            }
        }
        Ok(())
    }

    fn next_depth(&self) -> SensorResult<DepthFrame> {
        let streams = self.streams.as_ref().ok_or(SensorError::NotStarted)?;
        let frame = match streams.depth_rx.recv_timeout(DEPTH_TIMEOUT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => {
                return Err(SensorError::Acquisition(format!(
                    "no depth frame within {:?}",
                    DEPTH_TIMEOUT
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SensorError::Acquisition(
                    "depth stream disconnected".to_string(),
                ));
            }
        };

        let raw = frame.as_u16().ok_or(SensorError::EmptyFrame)?;
        let mut depth_mm = vec![0u16; raw.len()];
        streams.converter.convert_frame(raw, &mut depth_mm);
        DepthFrame::from_raw(frame.width, frame.height, depth_mm).ok_or(SensorError::EmptyFrame)
    }
}

impl SensorPipeline for KinectPipeline {
    fn start(&mut self, config: &StreamConfig) -> SensorResult<StreamProfile> {
        if self.streams.is_some() {
            return Err(SensorError::StartFailed("already running".to_string()));
        }
        if (config.width, config.height) != (KINECT_WIDTH, KINECT_HEIGHT) {
            return Err(SensorError::StartFailed(format!(
                "Kinect streams {}x{} only, requested {}x{}",
                KINECT_WIDTH, KINECT_HEIGHT, config.width, config.height
            )));
        }

        info!(device = self.device_index, stream = %config, "Starting Kinect pipeline");

        let mut streamer = KinectStreamer::new(self.device_index).map_err(|e| {
            SensorError::StartFailed(format!("failed to open depth camera: {}", e))
        })?;
        let (video_rx, depth_rx) = streamer
            .start(
                VideoFormat::Bayer,
                Resolution::Medium,
                freedepth::DepthFormat::Depth11Bit,
            )
            .map_err(|e| SensorError::StartFailed(format!("failed to start streaming: {}", e)))?;

        let registration = streamer.create_depth_registration();
        let converter = registration.depth_to_mm().clone();
        let registration = ColorRegistration {
            registration_table: registration.registration_table_flat().to_vec(),
            depth_to_rgb_shift: registration.depth_to_rgb_shift_table().to_vec(),
            target_offset: registration.target_offset(),
        };
        debug!(
            target_offset = registration.target_offset,
            entries = registration.registration_table.len(),
            "Fetched colour registration"
        );

        let profile = StreamProfile {
            config: *config,
            depth_scale: DEFAULT_DEPTH_SCALE,
            intrinsics: Intrinsics::kinect_default(config.width, config.height),
        };

        self.streams = Some(Streams {
            streamer,
            video_rx,
            depth_rx,
            converter,
            registration,
        });
        self.profile = Some(profile);
        self.last_color = None;
        self.frame_number = 0;
        Ok(profile)
    }

    fn wait_for_frames(&mut self) -> SensorResult<FrameSet> {
        let profile = self.profile.ok_or(SensorError::NotStarted)?;
        let depth = self.next_depth()?;
        self.drain_video()?;

        let registration = &self
            .streams
            .as_ref()
            .ok_or(SensorError::NotStarted)?
            .registration;
        let color = match &self.last_color {
            Some(color) => registration.align(color, &depth),
            None => depth_as_gray(&depth),
        };

        let number = self.frame_number;
        self.frame_number += 1;
        Ok(self.post.finish(number, color, depth, &profile))
    }

    fn stop(&mut self) {
        let Some(mut streams) = self.streams.take() else {
            return;
        };
        self.profile = None;
        streams.streamer.stop();
        if let Err(e) = streams.streamer.rebind_driver() {
            warn!("Failed to rebind kernel driver: {}", e);
        }
        info!(frames = self.frame_number, "Kinect pipeline stopped");
    }

    fn name(&self) -> &str {
        "kinect"
    }
}

impl Drop for KinectPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
