use glam::{DMat3, DVec3};

use crate::transforms::{axis_angle_to_rotation_matrix, CameraPose};

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    /// Image width
    pub width: usize,
    /// Image height
    pub height: usize,
}

/// Intrinsic and extrinsic calibration of a single camera.
///
/// The extrinsics follow the object-centered convention: a world point `Q` maps to the
/// camera frame as `R * Q + T`.
#[derive(Debug, Clone)]
pub struct CameraCalibration {
    /// Camera name, `cam_01` for the first camera.
    pub name: String,
    /// Image size in pixels.
    pub image_size: ImageSize,
    /// Pinhole camera matrix `K`.
    pub intrinsics: DMat3,
    /// Distortion coefficients `[k1, k2, p1, p2]`.
    pub distortion: [f64; 4],
    /// Axis-angle rotation of the camera.
    pub rotation: DVec3,
    /// Translation in meters.
    pub translation: DVec3,
    /// Residual reprojection error. `NaN` when the source does not provide it.
    pub residual_error: f64,
}

impl CameraCalibration {
    /// Extrinsics as a rotation matrix and translation.
    pub fn pose(&self) -> CameraPose {
        CameraPose::new(
            axis_angle_to_rotation_matrix(self.rotation),
            self.translation,
        )
    }
}

/// Name given to a camera from its zero-based position, e.g. `cam_01` for position 0.
pub fn camera_name(position: usize) -> String {
    format!("cam_{:02}", position + 1)
}
