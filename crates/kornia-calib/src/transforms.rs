use glam::{DMat3, DMat4, DVec3};

/// Maximum deviation tolerated when checking that a matrix is a proper rotation.
///
/// Calibration files store rotations as printed decimals, so exact orthonormality is not
/// expected.
pub const ROTATION_TOLERANCE: f64 = 1e-3;

/// Error types for the rotation algebra.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// The matrix is not orthonormal.
    #[error("rotation matrix is not orthonormal (max deviation {deviation:e})")]
    NonOrthonormal {
        /// Largest absolute entry of `R * R^T - I`.
        deviation: f64,
    },

    /// The matrix is orthonormal but contains a reflection.
    #[error("rotation matrix is not a proper rotation (determinant {determinant})")]
    ImproperRotation {
        /// Determinant of the matrix.
        determinant: f64,
    },

    /// The intrinsic matrix cannot be inverted.
    #[error("intrinsic matrix is singular (determinant {determinant})")]
    SingularIntrinsics {
        /// Determinant of the matrix.
        determinant: f64,
    },

    /// The intrinsic matrix is invertible but not an upper-triangular pinhole matrix.
    #[error("intrinsic matrix is malformed: {0}")]
    MalformedIntrinsics(&'static str),

    /// A computation produced NaN or infinite values.
    #[error("non-finite values in {0}")]
    NonFinite(&'static str),
}

/// A rigid transform mapping a point `Q` to `R * Q + T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Rotation matrix `R`.
    pub rotation: DMat3,
    /// Translation vector `T`.
    pub translation: DVec3,
}

impl CameraPose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Creates a pose from a rotation matrix and a translation.
    pub fn new(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }
}

/// Rotation angles in radians about the x, y and z axes.
///
/// The rotations are composed as `Rz * Ry * Rx`, so the x rotation is applied first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRotation {
    /// Angle about the x axis.
    pub angle_x: f64,
    /// Angle about the y axis.
    pub angle_y: f64,
    /// Angle about the z axis.
    pub angle_z: f64,
}

impl AxisRotation {
    /// Returns the composed rotation matrix `Rz * Ry * Rx`.
    pub fn matrix(&self) -> DMat3 {
        rotation_z(self.angle_z) * rotation_y(self.angle_y) * rotation_x(self.angle_x)
    }
}

/// Builds a 3x3 matrix from its rows.
pub fn mat3_from_rows(rows: &[[f64; 3]; 3]) -> DMat3 {
    // glam is column-major
    DMat3::from_cols_array_2d(rows).transpose()
}

/// Returns the rows of a 3x3 matrix.
pub fn mat3_to_rows(mat: &DMat3) -> [[f64; 3]; 3] {
    mat.transpose().to_cols_array_2d()
}

/// Skew-symmetric matrix `[v]x` such that `[v]x * w = v x w`.
pub fn skew(v: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, v.z, -v.y),
        DVec3::new(-v.z, 0.0, v.x),
        DVec3::new(v.y, -v.x, 0.0),
    )
}

/// Compute the rotation matrix from an axis-angle (Rodrigues) vector.
///
/// The direction of `rvec` is the rotation axis and its norm the angle in radians.
///
/// Example:
///
/// ```
/// use glam::DVec3;
/// use kornia_calib::transforms::axis_angle_to_rotation_matrix;
///
/// let rotation = axis_angle_to_rotation_matrix(DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
/// assert!((rotation * DVec3::X).abs_diff_eq(DVec3::Y, 1e-12));
/// ```
pub fn axis_angle_to_rotation_matrix(rvec: DVec3) -> DMat3 {
    let theta = rvec.length();

    // first order expansion, exact up to rounding for tiny angles
    if theta < f64::EPSILON {
        return DMat3::IDENTITY + skew(rvec);
    }

    let k = skew(rvec / theta);
    DMat3::IDENTITY + k * theta.sin() + k * k * (1.0 - theta.cos())
}

/// Compute the axis-angle (Rodrigues) vector of a rotation matrix.
///
/// The returned angle lies in `[0, pi]`.
///
/// PRECONDITION: `rotation` is a proper rotation, see [`validate_rotation`].
pub fn rotation_matrix_to_axis_angle(rotation: &DMat3) -> DVec3 {
    let r = rotation;

    // vee(R - R^T) = 2 sin(theta) k
    let axis_sin = DVec3::new(
        r.y_axis.z - r.z_axis.y,
        r.z_axis.x - r.x_axis.z,
        r.x_axis.y - r.y_axis.x,
    );

    let s = 0.5 * axis_sin.length();
    let c = (0.5 * (r.x_axis.x + r.y_axis.y + r.z_axis.z - 1.0)).clamp(-1.0, 1.0);
    let theta = s.atan2(c);

    if s < 1e-6 {
        if c > 0.0 {
            return 0.5 * axis_sin;
        }

        // theta close to pi: (R + I) / 2 = k k^T, any non-degenerate column is along k
        let kkt = (*r + DMat3::IDENTITY) * 0.5;
        let mut column = kkt.x_axis;
        for col in [kkt.y_axis, kkt.z_axis] {
            if col.length_squared() > column.length_squared() {
                column = col;
            }
        }
        let mut axis = column.normalize_or_zero();
        if axis.dot(axis_sin) < 0.0 {
            axis = -axis;
        }
        return axis * theta;
    }

    axis_sin * (theta / (2.0 * s))
}

/// Invert a rigid transform.
///
/// Converts between the object-centered convention `Qc = R * Q + T` and the camera-centered
/// one `Q = R^T * Qc - R^T * T`. Applying it twice returns the input.
pub fn invert_pose(pose: &CameraPose) -> CameraPose {
    let rotation = pose.rotation.transpose();
    CameraPose {
        rotation,
        translation: -(rotation * pose.translation),
    }
}

/// Rotation about the x axis.
pub fn rotation_x(angle: f64) -> DMat3 {
    let (s, c) = angle.sin_cos();
    mat3_from_rows(&[[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]])
}

/// Rotation about the y axis.
pub fn rotation_y(angle: f64) -> DMat3 {
    let (s, c) = angle.sin_cos();
    mat3_from_rows(&[[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]])
}

/// Rotation about the z axis.
pub fn rotation_z(angle: f64) -> DMat3 {
    let (s, c) = angle.sin_cos();
    mat3_from_rows(&[[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
}

/// Homogeneous 4x4 matrix of a pose.
pub fn pose_to_homogeneous(pose: &CameraPose) -> DMat4 {
    DMat4::from_cols(
        pose.rotation.x_axis.extend(0.0),
        pose.rotation.y_axis.extend(0.0),
        pose.rotation.z_axis.extend(0.0),
        pose.translation.extend(1.0),
    )
}

/// Split a homogeneous 4x4 matrix into rotation and translation.
pub fn homogeneous_to_pose(mat: &DMat4) -> CameraPose {
    CameraPose {
        rotation: DMat3::from_mat4(*mat),
        translation: mat.w_axis.truncate(),
    }
}

/// Rotate a pose about the world axes.
///
/// Computes `[R_ax 0; 0 1] * [R T; 0 1]` where `R_ax` is the composed axis rotation.
///
/// # Arguments
///
/// * `pose` - The pose to rotate.
/// * `axis_rotation` - Angles about x, y and z in radians.
///
/// # Returns
///
/// The rotated pose.
pub fn rotate_pose(pose: &CameraPose, axis_rotation: &AxisRotation) -> CameraPose {
    let r_ax_h = DMat4::from_mat3(axis_rotation.matrix());
    homogeneous_to_pose(&(r_ax_h * pose_to_homogeneous(pose)))
}

/// Same as [`rotate_pose`] with the rotation given as an axis-angle vector.
pub fn rotate_pose_axis_angle(
    rvec: DVec3,
    translation: DVec3,
    axis_rotation: &AxisRotation,
) -> CameraPose {
    let pose = CameraPose::new(axis_angle_to_rotation_matrix(rvec), translation);
    rotate_pose(&pose, axis_rotation)
}

/// Check that a matrix is a proper rotation: finite, orthonormal and with determinant `+1`.
pub fn validate_rotation(rotation: &DMat3) -> Result<(), GeometryError> {
    if !rotation.is_finite() {
        return Err(GeometryError::NonFinite("rotation matrix"));
    }

    let residual = *rotation * rotation.transpose() - DMat3::IDENTITY;
    let deviation = residual
        .to_cols_array()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if deviation > ROTATION_TOLERANCE {
        return Err(GeometryError::NonOrthonormal { deviation });
    }

    let determinant = rotation.determinant();
    if (determinant - 1.0).abs() > ROTATION_TOLERANCE {
        return Err(GeometryError::ImproperRotation { determinant });
    }

    Ok(())
}

/// Check that a pose is a proper rotation with a finite translation.
pub fn validate_pose(pose: &CameraPose) -> Result<(), GeometryError> {
    validate_rotation(&pose.rotation)?;
    if !pose.translation.is_finite() {
        return Err(GeometryError::NonFinite("translation vector"));
    }
    Ok(())
}

/// Check that an intrinsic matrix is a finite, invertible pinhole matrix.
///
/// The expected layout is `[[fx, s, cx], [0, fy, cy], [0, 0, w]]` with non-zero `fx`, `fy`
/// and `w`.
pub fn validate_intrinsics(intrinsics: &DMat3) -> Result<(), GeometryError> {
    if !intrinsics.is_finite() {
        return Err(GeometryError::NonFinite("intrinsic matrix"));
    }

    // glam is column-major: row r, column c is `col(c)[r]`
    let k = intrinsics;
    if k.x_axis.y != 0.0 || k.x_axis.z != 0.0 || k.y_axis.z != 0.0 {
        return Err(GeometryError::MalformedIntrinsics("entries below the diagonal must be zero"));
    }

    let determinant = intrinsics.determinant();
    let (fx, fy, w) = (k.x_axis.x, k.y_axis.y, k.z_axis.z);
    if fx == 0.0 || fy == 0.0 || w == 0.0 || determinant.abs() < f64::EPSILON {
        return Err(GeometryError::SingularIntrinsics { determinant });
    }

    Ok(())
}
