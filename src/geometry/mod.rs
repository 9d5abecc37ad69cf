// SPDX-License-Identifier: GPL-3.0-only

//! Plane geometry: point cloud extraction, PCA normal fit and angles

pub mod angle;
pub mod plane;
pub mod point_cloud;

pub use angle::{angle_between, angle_from_cosine, y_rotation};
pub use plane::{InvalidPlane, PlaneFit, PlaneNormal, estimate_normal};
pub use point_cloud::{DepthSample, DepthView, PointCloud, Roi, extract_point_cloud};
