use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use glam::DVec3;

use crate::{
    camera::{camera_name, CameraCalibration, ImageSize},
    error::{CalibError, CalibResult},
    transforms::{
        mat3_from_rows, rotation_matrix_to_axis_angle, validate_intrinsics, validate_rotation,
    },
};

/// The source files store translations in millimeters.
const MILLIMETERS_PER_METER: f64 = 1000.0;

// line layout of a calibration record
const WIDTH_LINE: usize = 0;
const HEIGHT_LINE: usize = 1;
const INTRINSICS_LINE: usize = 2;
const EXTRINSICS_LINE: usize = 6;

/// List the calibration files of a directory.
///
/// Calibration files are the regular files without extension. The list is sorted by file
/// name so that camera indices do not depend on the directory listing order.
///
/// # Arguments
///
/// * `dir` - The directory holding the calibration files.
///
/// # Returns
///
/// The sorted paths of the calibration files. Empty if there are none.
pub fn list_calibration_files(dir: impl AsRef<Path>) -> CalibResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_none() && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Read a bioCV calibration file.
///
/// # Arguments
///
/// * `path` - The path to the calibration file.
/// * `position` - Zero-based position of the file in the camera list, used for naming.
///
/// # Returns
///
/// The calibration of the camera.
pub fn read_calibration_file(
    path: impl AsRef<Path>,
    position: usize,
) -> CalibResult<CameraCalibration> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_calibration(path, &content, position)
}

/// Read every calibration file of a directory, in the order of [`list_calibration_files`].
///
/// Stops at the first file that fails to parse.
pub fn read_calibration_dir(dir: impl AsRef<Path>) -> CalibResult<Vec<CameraCalibration>> {
    let dir = dir.as_ref();
    let paths = list_calibration_files(dir)?;
    log::info!(
        "Found {} calibration files in {}",
        paths.len(),
        dir.display()
    );

    paths
        .iter()
        .enumerate()
        .map(|(position, path)| read_calibration_file(path, position))
        .collect()
}

/// Parse the content of a bioCV calibration file.
///
/// The record is line based:
///
/// * line 0: image width
/// * line 1: image height
/// * lines 2-4: rows of the intrinsic matrix
/// * line 5: unused
/// * lines 6-8: rows of `[R | T]`, translation in millimeters
/// * second to last line: distortion coefficients, the first four are kept
///
/// # Arguments
///
/// * `path` - Path of the file, used in error messages.
/// * `content` - The file content.
/// * `position` - Zero-based position of the file in the camera list.
pub fn parse_calibration(
    path: &Path,
    content: &str,
    position: usize,
) -> CalibResult<CameraCalibration> {
    let lines = content.split('\n').collect::<Vec<_>>();

    // the distortion line must come after the extrinsics block
    if lines.len() < EXTRINSICS_LINE + 4 {
        return Err(CalibError::MissingLine {
            path: path.to_path_buf(),
            line: lines.len(),
        });
    }

    let width = parse_image_dim(path, &lines, WIDTH_LINE)?;
    let height = parse_image_dim(path, &lines, HEIGHT_LINE)?;

    let intrinsics = mat3_from_rows(&[
        parse_row::<3>(path, &lines, INTRINSICS_LINE)?,
        parse_row::<3>(path, &lines, INTRINSICS_LINE + 1)?,
        parse_row::<3>(path, &lines, INTRINSICS_LINE + 2)?,
    ]);
    validate_intrinsics(&intrinsics)?;

    let rt = [
        parse_row::<4>(path, &lines, EXTRINSICS_LINE)?,
        parse_row::<4>(path, &lines, EXTRINSICS_LINE + 1)?,
        parse_row::<4>(path, &lines, EXTRINSICS_LINE + 2)?,
    ];
    let rotation_mat = mat3_from_rows(&rt.map(|row| [row[0], row[1], row[2]]));
    validate_rotation(&rotation_mat)?;

    let translation = DVec3::new(rt[0][3], rt[1][3], rt[2][3]) / MILLIMETERS_PER_METER;

    let distortion_line = lines.len() - 2;
    if distortion_line == EXTRINSICS_LINE + 2 {
        log::warn!(
            "{}: no line after the extrinsics, distortion is read from line {}",
            path.display(),
            distortion_line
        );
    }
    let distortion = parse_tokens::<f64>(path, distortion_line, lines[distortion_line])?
        .get(..4)
        .and_then(|d| <[f64; 4]>::try_from(d).ok())
        .ok_or_else(|| CalibError::Parse {
            path: path.to_path_buf(),
            line: distortion_line,
            message: "expected at least 4 distortion coefficients".to_string(),
        })?;

    let calibration = CameraCalibration {
        name: camera_name(position),
        image_size: ImageSize { width, height },
        intrinsics,
        distortion,
        rotation: rotation_matrix_to_axis_angle(&rotation_mat),
        translation,
        residual_error: f64::NAN,
    };

    log::debug!(
        "Parsed {} from {}: {}x{}",
        calibration.name,
        path.display(),
        width,
        height
    );

    Ok(calibration)
}

/// Utility function to parse a single token of a given line.
fn parse_part<T: FromStr>(path: &Path, line: usize, s: &str) -> CalibResult<T>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>().map_err(|e| CalibError::Parse {
        path: path.to_path_buf(),
        line,
        message: format!("{}: {}", s, e),
    })
}

fn parse_tokens<T: FromStr>(path: &Path, line: usize, s: &str) -> CalibResult<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    s.split_whitespace()
        .map(|token| parse_part(path, line, token))
        .collect()
}

/// Parse a line holding exactly `N` floats.
fn parse_row<const N: usize>(path: &Path, lines: &[&str], line: usize) -> CalibResult<[f64; N]> {
    let values = parse_tokens::<f64>(path, line, lines[line])?;
    let num_values = values.len();
    values.try_into().map_err(|_| CalibError::Parse {
        path: path.to_path_buf(),
        line,
        message: format!("expected {} values, found {}", N, num_values),
    })
}

fn parse_image_dim(path: &Path, lines: &[&str], line: usize) -> CalibResult<usize> {
    let dim = parse_part::<usize>(path, line, lines[line].trim())?;
    if dim == 0 {
        return Err(CalibError::Parse {
            path: path.to_path_buf(),
            line,
            message: "image size must be positive".to_string(),
        });
    }
    Ok(dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::GeometryError;
    use approx::assert_relative_eq;

    const IDENTITY_RECORD: &str = "1920
1080
1500.0 0.0 960.0
0.0 1500.0 540.0
0.0 0.0 1.0

1.0 0.0 0.0 1000.0
0.0 1.0 0.0 2000.0
0.0 0.0 1.0 3000.0
0.1 -0.05 0.001 0.002 0.3
";

    fn parse(content: &str) -> CalibResult<CameraCalibration> {
        parse_calibration(Path::new("cam"), content, 0)
    }

    #[test]
    fn test_parse_calibration() -> Result<(), Box<dyn std::error::Error>> {
        let calib = parse(IDENTITY_RECORD)?;
        assert_eq!(calib.name, "cam_01");
        assert_eq!(
            calib.image_size,
            ImageSize {
                width: 1920,
                height: 1080
            }
        );
        assert_eq!(calib.intrinsics.x_axis.x, 1500.0);
        assert_eq!(calib.intrinsics.z_axis.x, 960.0);
        assert_eq!(calib.intrinsics.z_axis.y, 540.0);
        assert_eq!(calib.distortion, [0.1, -0.05, 0.001, 0.002]);
        assert_eq!(calib.rotation, DVec3::ZERO);
        assert!(calib.residual_error.is_nan());
        Ok(())
    }

    #[test]
    fn test_translation_millimeters_to_meters() -> Result<(), Box<dyn std::error::Error>> {
        let calib = parse(IDENTITY_RECORD)?;
        assert_relative_eq!(calib.translation.x, 1.0);
        assert_relative_eq!(calib.translation.y, 2.0);
        assert_relative_eq!(calib.translation.z, 3.0);
        Ok(())
    }

    #[test]
    fn test_distortion_second_to_last_line_without_trailing_newline(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = format!("{}0.5 0.5 0.5 0.5", IDENTITY_RECORD);
        let calib = parse(&content)?;
        assert_eq!(calib.distortion, [0.1, -0.05, 0.001, 0.002]);
        Ok(())
    }

    #[test]
    fn test_rotation_matrix_to_axis_angle() -> Result<(), Box<dyn std::error::Error>> {
        // quarter turn about z
        let content = IDENTITY_RECORD
            .replace("1.0 0.0 0.0 1000.0", "0.0 -1.0 0.0 1000.0")
            .replace("0.0 1.0 0.0 2000.0", "1.0 0.0 0.0 2000.0");
        let calib = parse(&content)?;
        assert!(calib
            .rotation
            .abs_diff_eq(DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2), 1e-12));
        Ok(())
    }

    #[test]
    fn test_malformed_token_reports_line() {
        let content = IDENTITY_RECORD.replace("0.0 1500.0 540.0", "0.0 abc 540.0");
        match parse(&content) {
            Err(CalibError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_row_length() {
        let content = IDENTITY_RECORD.replace("0.0 0.0 1.0 3000.0", "0.0 0.0 1.0");
        match parse(&content) {
            Err(CalibError::Parse { line, message, .. }) => {
                assert_eq!(line, 8);
                assert!(message.contains("expected 4 values"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_short_distortion_line() {
        let content = IDENTITY_RECORD.replace("0.1 -0.05 0.001 0.002 0.3", "0.1 -0.05");
        assert!(matches!(
            parse(&content),
            Err(CalibError::Parse { line: 9, .. })
        ));
    }

    #[test]
    fn test_truncated_file() {
        assert!(matches!(
            parse("640\n480\n"),
            Err(CalibError::MissingLine { .. })
        ));
    }

    #[test]
    fn test_zero_image_size() {
        let content = IDENTITY_RECORD.replacen("1920", "0", 1);
        assert!(matches!(
            parse(&content),
            Err(CalibError::Parse { line: 0, .. })
        ));
    }

    #[test]
    fn test_reflection_is_rejected() {
        let content = IDENTITY_RECORD.replace("0.0 0.0 1.0 3000.0", "0.0 0.0 -1.0 3000.0");
        assert!(matches!(
            parse(&content),
            Err(CalibError::Geometry(GeometryError::ImproperRotation { .. }))
        ));
    }

    #[test]
    fn test_singular_intrinsics_are_rejected() {
        let content = IDENTITY_RECORD.replace("0.0 0.0 1.0\n", "0.0 0.0 0.0\n");
        assert!(matches!(
            parse(&content),
            Err(CalibError::Geometry(
                GeometryError::SingularIntrinsics { .. }
            ))
        ));
    }

    #[test]
    fn test_swapped_focal_lengths_are_rejected() {
        let content = IDENTITY_RECORD
            .replace("1500.0 0.0 960.0", "0.0 1500.0 960.0")
            .replace("0.0 1500.0 540.0", "1500.0 0.0 540.0");
        assert!(matches!(
            parse(&content),
            Err(CalibError::Geometry(GeometryError::MalformedIntrinsics(_)))
        ));
    }

    #[test]
    fn test_distortion_from_last_extrinsics_row() -> Result<(), Box<dyn std::error::Error>> {
        // ten lines without a trailing newline: the second-to-last piece is extrinsics row 8
        let content = IDENTITY_RECORD.trim_end();
        let calib = parse(content)?;
        assert_eq!(calib.distortion, [0.0, 0.0, 1.0, 3000.0]);
        assert_relative_eq!(calib.translation.z, 3.0);
        Ok(())
    }

    #[test]
    fn test_list_calibration_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        for name in ["cam_b", "cam_a", "notes.txt", "cam00.bin", "cam1a2b3c.tmp"] {
            fs::write(dir.path().join(name), IDENTITY_RECORD)?;
        }
        fs::create_dir(dir.path().join("subdir"))?;

        let files = list_calibration_files(dir.path())?;
        let names = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["cam_a", "cam_b"]);
        Ok(())
    }

    #[test]
    fn test_read_calibration_dir() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("1"), IDENTITY_RECORD)?;
        fs::write(dir.path().join("2"), IDENTITY_RECORD)?;

        let calibs = read_calibration_dir(dir.path())?;
        let names = calibs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["cam_01", "cam_02"]);
        Ok(())
    }

    #[test]
    fn test_read_empty_dir() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert!(read_calibration_dir(dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_missing_dir() {
        assert!(matches!(
            read_calibration_dir("/path/to/non/existent/directory"),
            Err(CalibError::Io(_))
        ));
    }
}
