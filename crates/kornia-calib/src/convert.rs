use std::{
    f64::consts::{FRAC_PI_2, PI},
    fs,
    path::{Path, PathBuf},
};

use crate::{
    camera::CameraCalibration,
    error::{CalibError, CalibResult},
    io::{
        biocv::{list_calibration_files, read_calibration_file},
        opencap::{write_artifact, ArtifactFormat, OpenCapCalibration},
    },
    transforms::{
        invert_pose, mat3_to_rows, rotate_pose, validate_intrinsics, validate_pose, AxisRotation,
        CameraPose, GeometryError,
    },
};

/// Re-orientation from the vertical calibration board of the source system to the
/// horizontal world frame of the target system.
pub const VERTICAL_TO_HORIZONTAL: AxisRotation = AxisRotation {
    angle_x: -FRAC_PI_2,
    angle_y: 0.0,
    angle_z: PI,
};

/// What to do when a camera of a batch fails to convert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Abort the batch on the first failing camera.
    #[default]
    FailFast,
    /// Log the failing camera and continue with the next one.
    SkipFailed,
}

/// Configuration of a directory conversion.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Directory holding the source calibration files.
    pub input_dir: PathBuf,
    /// Directory receiving the artifacts. Defaults to `input_dir`.
    pub output_dir: Option<PathBuf>,
    /// Serialization format of the artifacts.
    pub format: ArtifactFormat,
    /// Failure policy for the batch.
    pub policy: BatchPolicy,
}

impl ConvertConfig {
    /// Creates a configuration writing the artifacts next to the source files.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: None,
            format: ArtifactFormat::default(),
            policy: BatchPolicy::default(),
        }
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    /// Sets the artifact format.
    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the batch failure policy.
    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The directory receiving the artifacts.
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.input_dir)
    }
}

/// A camera written by [`convert_dir`].
#[derive(Debug, Clone)]
pub struct ConvertedCamera {
    /// Zero-based index of the camera in the resolved file list.
    pub index: usize,
    /// Camera name.
    pub name: String,
    /// Path of the written artifact.
    pub artifact_path: PathBuf,
    /// Camera pose in the target world frame. Not persisted in the artifact.
    pub pose: CameraPose,
}

/// A camera left out by [`convert_dir`] under [`BatchPolicy::SkipFailed`].
#[derive(Debug)]
pub struct SkippedCamera {
    /// Zero-based index of the camera in the resolved file list.
    pub index: usize,
    /// Path of the source calibration file.
    pub source_path: PathBuf,
    /// Why the camera failed.
    pub error: CalibError,
}

/// Outcome of [`convert_dir`].
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Cameras written, in index order.
    pub converted: Vec<ConvertedCamera>,
    /// Cameras that failed, in index order.
    pub skipped: Vec<SkippedCamera>,
}

/// Compute the pose of a camera in the target world frame.
///
/// The object-centered extrinsics are turned into the camera pose in the world, rotated with
/// [`VERTICAL_TO_HORIZONTAL`] and turned back into object-centered extrinsics.
///
/// # Arguments
///
/// * `calib` - The calibration with extrinsics in the source world frame.
///
/// # Returns
///
/// The object-centered extrinsics in the target world frame.
pub fn target_frame_pose(calib: &CameraCalibration) -> Result<CameraPose, GeometryError> {
    let pose = calib.pose();
    validate_pose(&pose)?;

    let world = invert_pose(&pose);
    let world_rotated = rotate_pose(&world, &VERTICAL_TO_HORIZONTAL);
    let target = invert_pose(&world_rotated);
    validate_pose(&target)?;

    Ok(target)
}

/// Build the OpenCap record of a camera.
///
/// The distortion gets a trailing zero coefficient and the image size becomes a
/// `(height, width)` column.
pub fn to_artifact(calib: &CameraCalibration) -> OpenCapCalibration {
    let [k1, k2, p1, p2] = calib.distortion;
    OpenCapCalibration {
        distortion: [k1, k2, p1, p2, 0.0],
        intrinsic_mat: mat3_to_rows(&calib.intrinsics),
        image_size: [[calib.image_size.height], [calib.image_size.width]],
    }
}

/// Convert a single camera and write its artifact.
///
/// # Arguments
///
/// * `calib` - The source calibration.
/// * `index` - Zero-based camera index, used for the artifact name.
/// * `output_dir` - Directory receiving the artifact.
/// * `format` - Serialization format of the artifact.
pub fn convert_camera(
    calib: &CameraCalibration,
    index: usize,
    output_dir: impl AsRef<Path>,
    format: ArtifactFormat,
) -> CalibResult<ConvertedCamera> {
    validate_intrinsics(&calib.intrinsics)?;
    let pose = target_frame_pose(calib)?;
    let artifact_path = write_artifact(output_dir, index, &to_artifact(calib), format)?;

    log::debug!(
        "Converted {} -> {}: R = {:?}, T = {:?}",
        calib.name,
        artifact_path.display(),
        mat3_to_rows(&pose.rotation),
        pose.translation.to_array()
    );

    Ok(ConvertedCamera {
        index,
        name: calib.name.clone(),
        artifact_path,
        pose,
    })
}

/// Convert every calibration file of a directory.
///
/// Calibration files are read in the order of [`list_calibration_files`]; the camera at
/// position `i` of that list is written as `cam<i>`. Each artifact is written atomically.
///
/// # Arguments
///
/// * `config` - The conversion configuration.
///
/// # Returns
///
/// The converted and skipped cameras. Listing the input directory or creating the output
/// directory fails the whole batch regardless of the policy.
pub fn convert_dir(config: &ConvertConfig) -> CalibResult<ConversionReport> {
    let paths = list_calibration_files(&config.input_dir)?;

    let output_dir = config.output_dir();
    fs::create_dir_all(output_dir)?;
    log::info!(
        "Converting {} calibration files from {} into {}",
        paths.len(),
        config.input_dir.display(),
        output_dir.display()
    );

    let mut report = ConversionReport::default();
    for (index, path) in paths.into_iter().enumerate() {
        let result = read_calibration_file(&path, index)
            .and_then(|calib| convert_camera(&calib, index, output_dir, config.format));

        match (result, config.policy) {
            (Ok(converted), _) => report.converted.push(converted),
            (Err(error), BatchPolicy::FailFast) => {
                return Err(CalibError::Camera {
                    name: source_name(&path),
                    source: Box::new(error),
                });
            }
            (Err(error), BatchPolicy::SkipFailed) => {
                log::warn!("Skipping {}: {}", path.display(), error);
                report.skipped.push(SkippedCamera {
                    index,
                    source_path: path,
                    error,
                });
            }
        }
    }

    log::info!(
        "Wrote {} calibration artifacts, skipped {}",
        report.converted.len(),
        report.skipped.len()
    );

    Ok(report)
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
