// SPDX-License-Identifier: GPL-3.0-only

//! Angle utilities for plane orientation
//!
//! Angles between vectors come from `atan2(|a × b|, a · b)`, which stays
//! exact for parallel and antiparallel inputs where a normalised dot product
//! would round to just inside or outside [-1, 1]. Code that only has a
//! cosine goes through [`angle_from_cosine`], which clamps it first.

use nalgebra::Vector3;
use tracing::trace;

/// Shortest vector length accepted as a direction
pub const MIN_VECTOR_NORM: f64 = 1e-5;

/// Reference axis for the Y-rotation readout
pub const Y_AXIS: [f64; 3] = [0.0, 1.0, 0.0];

/// Angle in degrees for a cosine, clamped into the acos domain
#[inline]
pub fn angle_from_cosine(cosine: f64) -> f64 {
    let clamped = cosine.clamp(-1.0, 1.0);
    if clamped != cosine {
        trace!(cosine, "Clamped cosine into [-1, 1]");
    }
    clamped.acos().to_degrees()
}

/// Unsigned angle between two vectors in degrees, in [0, 180]
///
/// Returns `None` if either vector is shorter than [`MIN_VECTOR_NORM`] or
/// not finite.
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> Option<f64> {
    let na = a.norm();
    let nb = b.norm();
    if !(na.is_finite() && nb.is_finite()) || na < MIN_VECTOR_NORM || nb < MIN_VECTOR_NORM {
        return None;
    }
    Some(a.cross(b).norm().atan2(a.dot(b)).to_degrees())
}

/// Rotation about the camera's Z axis, measured from +Y, in degrees
///
/// `v` is projected onto the X-Y plane first. A projection that vanishes
/// (e.g. a normal looking straight down the camera axis) has no defined
/// rotation and yields `None`.
pub fn y_rotation(v: &Vector3<f64>) -> Option<f64> {
    let projected = Vector3::new(v.x, v.y, 0.0);
    angle_between(&projected, &Vector3::from(Y_AXIS))
}
