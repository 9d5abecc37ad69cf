// SPDX-License-Identifier: GPL-3.0-only

//! Depth post-processing applied by sensor pipelines
//!
//! Every pipeline hands out frames that went through the same chain:
//! hole filling on the raw depth, then colorization for display.

use super::colorize::Colorizer;
use super::types::{ColorFrame, DepthFrame, FrameSet, StreamProfile};
use serde::{Deserialize, Serialize};

/// How a missing (zero) depth pixel is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HoleFillingMode {
    /// Use the (already filled) pixel to the left
    FillFromLeft,
    /// Use the farthest valid 4-neighbour
    #[default]
    FarestFromAround,
    /// Use the nearest valid 4-neighbour
    NearestFromAround,
}

/// Fills zero-depth pixels from their neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HoleFillingFilter {
    pub mode: HoleFillingMode,
}

impl HoleFillingFilter {
    pub fn new(mode: HoleFillingMode) -> Self {
        Self { mode }
    }

    /// Fill holes in place; returns the number of pixels that were filled
    pub fn process(&self, frame: &mut DepthFrame) -> usize {
        match self.mode {
            HoleFillingMode::FillFromLeft => fill_from_left(frame),
            HoleFillingMode::FarestFromAround => fill_from_around(frame, u16::max),
            HoleFillingMode::NearestFromAround => fill_from_around(frame, u16::min),
        }
    }
}

fn fill_from_left(frame: &mut DepthFrame) -> usize {
    let width = frame.width as usize;
    if width == 0 {
        return 0;
    }
    let mut filled = 0;
    for row in frame.data.chunks_exact_mut(width) {
        for x in 1..width {
            if row[x] == 0 && row[x - 1] != 0 {
                row[x] = row[x - 1];
                filled += 1;
            }
        }
    }
    filled
}

/// Single pass over the unfilled input, so fills never feed each other
fn fill_from_around(frame: &mut DepthFrame, pick: fn(u16, u16) -> u16) -> usize {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let src = frame.data.clone();
    let mut filled = 0;

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if src[idx] != 0 {
                continue;
            }
            let neighbours = [
                (x > 0).then(|| src[idx - 1]),
                (x + 1 < w).then(|| src[idx + 1]),
                (y > 0).then(|| src[idx - w]),
                (y + 1 < h).then(|| src[idx + w]),
            ];
            let best = neighbours
                .into_iter()
                .flatten()
                .filter(|&d| d != 0)
                .reduce(pick);
            if let Some(value) = best {
                frame.data[idx] = value;
                filled += 1;
            }
        }
    }
    filled
}

/// Post-processing chain shared by all pipelines
#[derive(Debug, Clone, Default)]
pub struct PostProcessing {
    pub hole_filling: Option<HoleFillingFilter>,
    pub colorizer: Colorizer,
}

impl PostProcessing {
    pub fn new(hole_filling: Option<HoleFillingMode>, colorizer: Colorizer) -> Self {
        Self {
            hole_filling: hole_filling.map(HoleFillingFilter::new),
            colorizer,
        }
    }

    /// Filter the depth buffer and assemble the frame set handed to the loop
    pub fn finish(
        &self,
        number: u64,
        color: ColorFrame,
        mut depth: DepthFrame,
        profile: &StreamProfile,
    ) -> FrameSet {
        if let Some(filter) = &self.hole_filling {
            let filled = filter.process(&mut depth);
            tracing::trace!(frame = number, filled, "Hole filling");
        }
        let colorized_depth = self.colorizer.colorize(&depth, profile.depth_scale);

        FrameSet {
            number,
            color,
            depth,
            colorized_depth,
            depth_scale: profile.depth_scale,
            intrinsics: profile.intrinsics,
        }
    }
}
