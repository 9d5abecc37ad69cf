// SPDX-License-Identifier: GPL-3.0-only

//! Plane normal estimation by principal component analysis
//!
//! The covariance of the centred points is eigen-decomposed; the eigenvector
//! of the smallest eigenvalue (the least significant principal axis) is the
//! plane normal. No sign convention is applied to it.

use super::point_cloud::PointCloud;
use nalgebra::{Matrix3, Point3, Vector3};
use std::fmt;

/// Minimum number of points for a 3-D fit
pub const MIN_PLANE_POINTS: usize = 3;

/// Candidate normals shorter than this are rejected
pub const NORMAL_NORM_EPSILON: f64 = 1e-5;

/// Relative eigenvalue threshold below which a principal axis is considered empty
const RANK_THRESHOLD: f64 = 1e-8;

/// A successfully fitted plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneNormal {
    /// Unit normal, arbitrary sign
    pub normal: Vector3<f64>,
    /// Centroid of the fitted points
    pub centroid: Point3<f64>,
    /// Covariance eigenvalues, ascending
    pub eigenvalues: [f64; 3],
    /// Number of points used
    pub point_count: usize,
}

/// Why no plane could be fitted to a point cloud
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidPlane {
    /// Fewer than [`MIN_PLANE_POINTS`] points
    InsufficientPoints { count: usize },
    /// All points share one location
    Coincident,
    /// All points lie on a single line
    Collinear,
    /// Candidate normal collapsed below [`NORMAL_NORM_EPSILON`] or is not finite
    DegenerateNormal { norm: f64 },
}

impl fmt::Display for InvalidPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidPlane::InsufficientPoints { count } => write!(
                f,
                "insufficient points: got {}, need at least {}",
                count, MIN_PLANE_POINTS
            ),
            InvalidPlane::Coincident => write!(f, "all points coincide"),
            InvalidPlane::Collinear => write!(f, "points are collinear"),
            InvalidPlane::DegenerateNormal { norm } => {
                write!(f, "invalid normal vector (norm {:e})", norm)
            }
        }
    }
}

/// Result of a plane fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaneFit {
    Valid(PlaneNormal),
    Invalid(InvalidPlane),
}

impl PlaneFit {
    pub fn is_valid(&self) -> bool {
        matches!(self, PlaneFit::Valid(_))
    }

    /// Fitted unit normal, if any
    pub fn normal(&self) -> Option<Vector3<f64>> {
        match self {
            PlaneFit::Valid(plane) => Some(plane.normal),
            PlaneFit::Invalid(_) => None,
        }
    }

    pub fn invalid_reason(&self) -> Option<InvalidPlane> {
        match self {
            PlaneFit::Valid(_) => None,
            PlaneFit::Invalid(reason) => Some(*reason),
        }
    }
}

/// Fit a plane to `cloud` and return its normal
pub fn estimate_normal(cloud: &PointCloud) -> PlaneFit {
    let n = cloud.len();
    if n < MIN_PLANE_POINTS {
        return PlaneFit::Invalid(InvalidPlane::InsufficientPoints { count: n });
    }

    let mut centroid = Vector3::zeros();
    for pt in cloud.iter() {
        centroid += pt.coords;
    }
    centroid /= n as f64;

    let mut cov = Matrix3::zeros();
    for pt in cloud.iter() {
        let centered = pt.coords - centroid;
        cov += centered * centered.transpose();
    }
    cov /= n as f64;

    if cov.iter().any(|v| !v.is_finite()) {
        return PlaneFit::Invalid(InvalidPlane::DegenerateNormal { norm: f64::NAN });
    }

    let eigen = cov.symmetric_eigen();

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let eigenvalues = order.map(|i| eigen.eigenvalues[i]);
    let [_, second, largest] = eigenvalues;

    if !largest.is_finite() || largest <= RANK_THRESHOLD {
        return PlaneFit::Invalid(InvalidPlane::Coincident);
    }
    if second / largest < RANK_THRESHOLD {
        return PlaneFit::Invalid(InvalidPlane::Collinear);
    }

    let candidate: Vector3<f64> = eigen.eigenvectors.column(order[0]).into_owned();
    let norm = candidate.norm();
    if !norm.is_finite() || norm < NORMAL_NORM_EPSILON {
        return PlaneFit::Invalid(InvalidPlane::DegenerateNormal { norm });
    }

    PlaneFit::Valid(PlaneNormal {
        normal: candidate / norm,
        centroid: Point3::from(centroid),
        eigenvalues,
        point_count: n,
    })
}
