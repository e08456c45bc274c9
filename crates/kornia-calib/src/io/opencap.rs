use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::{CalibError, CalibResult};

/// Calibration of a single camera in the OpenCap layout.
///
/// Extrinsics are not part of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct OpenCapCalibration {
    /// Distortion coefficients `[k1, k2, p1, p2, k3]`, `k3` is always zero.
    pub distortion: [f64; 5],
    /// Pinhole camera matrix, row-major.
    #[serde(rename = "intrinsicMat")]
    pub intrinsic_mat: [[f64; 3]; 3],
    /// Image size as a 2x1 column in `(height, width)` order.
    #[serde(rename = "imageSize")]
    pub image_size: [[usize; 1]; 2],
}

impl OpenCapCalibration {
    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.image_size[0][0]
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.image_size[1][0]
    }
}

/// Serialization format of the calibration artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// bincode with the standard configuration.
    #[default]
    Bincode,
    /// Pretty printed JSON.
    Json,
}

impl ArtifactFormat {
    /// File extension of the format.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Bincode => "bin",
            ArtifactFormat::Json => "json",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactFormat::Bincode => write!(f, "bincode"),
            ArtifactFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bincode" | "bin" => Ok(ArtifactFormat::Bincode),
            "json" => Ok(ArtifactFormat::Json),
            _ => Err(format!("unknown artifact format: {}", s)),
        }
    }
}

/// File name of the artifact of a camera, e.g. `cam00.bin` for index 0.
pub fn artifact_file_name(index: usize, format: ArtifactFormat) -> String {
    format!("cam{:02}.{}", index, format.extension())
}

/// Serialize an artifact into bytes.
pub fn encode_artifact(
    artifact: &OpenCapCalibration,
    format: ArtifactFormat,
) -> CalibResult<Vec<u8>> {
    match format {
        ArtifactFormat::Bincode => bincode::encode_to_vec(artifact, bincode::config::standard())
            .map_err(|e| CalibError::Encode(e.to_string())),
        ArtifactFormat::Json => {
            serde_json::to_vec_pretty(artifact).map_err(|e| CalibError::Encode(e.to_string()))
        }
    }
}

/// Deserialize an artifact from bytes.
pub fn decode_artifact(bytes: &[u8], format: ArtifactFormat) -> CalibResult<OpenCapCalibration> {
    match format {
        ArtifactFormat::Bincode => {
            let (artifact, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| CalibError::Decode(e.to_string()))?;
            Ok(artifact)
        }
        ArtifactFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| CalibError::Decode(e.to_string()))
        }
    }
}

/// Write the artifact of a camera into a directory.
///
/// The record is written to a temporary file in `dir` and renamed into place, so the
/// destination either holds the full record or is left untouched. The temporary file carries
/// a `.tmp` extension, so a leftover one is never taken for a calibration source.
///
/// # Arguments
///
/// * `dir` - The output directory.
/// * `index` - Zero-based camera index, used for the file name.
/// * `artifact` - The record to write.
/// * `format` - The serialization format.
///
/// # Returns
///
/// The path of the written file.
pub fn write_artifact(
    dir: impl AsRef<Path>,
    index: usize,
    artifact: &OpenCapCalibration,
    format: ArtifactFormat,
) -> CalibResult<PathBuf> {
    let dir = dir.as_ref();
    let path = dir.join(artifact_file_name(index, format));

    // encode first so that a serialization error leaves no file behind
    let bytes = encode_artifact(artifact, format)?;

    let mut file = tempfile::Builder::new()
        .prefix("cam")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    file.write_all(&bytes)?;
    file.as_file().sync_all()?;
    file.persist(&path).map_err(|e| e.error)?;

    log::debug!("Wrote {}", path.display());

    Ok(path)
}

/// Read an artifact written by [`write_artifact`].
pub fn read_artifact(
    path: impl AsRef<Path>,
    format: ArtifactFormat,
) -> CalibResult<OpenCapCalibration> {
    let bytes = fs::read(path)?;
    decode_artifact(&bytes, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OpenCapCalibration {
        OpenCapCalibration {
            distortion: [0.1, -0.05, 0.001, 0.002, 0.0],
            intrinsic_mat: [[1500.0, 0.0, 960.0], [0.0, 1500.0, 540.0], [0.0, 0.0, 1.0]],
            image_size: [[1080], [1920]],
        }
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name(0, ArtifactFormat::Bincode), "cam00.bin");
        assert_eq!(artifact_file_name(7, ArtifactFormat::Json), "cam07.json");
        assert_eq!(artifact_file_name(12, ArtifactFormat::Bincode), "cam12.bin");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<ArtifactFormat>(), Ok(ArtifactFormat::Json));
        assert_eq!(
            "BINCODE".parse::<ArtifactFormat>(),
            Ok(ArtifactFormat::Bincode)
        );
        assert!("pickle".parse::<ArtifactFormat>().is_err());
    }

    #[test]
    fn test_height_width_order() {
        let artifact = sample();
        assert_eq!(artifact.height(), 1080);
        assert_eq!(artifact.width(), 1920);
    }

    #[test]
    fn test_json_keys() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = encode_artifact(&sample(), ArtifactFormat::Json)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(value["imageSize"], serde_json::json!([[1080], [1920]]));
        assert_eq!(value["intrinsicMat"][0][2], serde_json::json!(960.0));
        assert_eq!(value["distortion"].as_array().map(|d| d.len()), Some(5));
        Ok(())
    }

    #[test]
    fn test_write_and_read() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        for format in [ArtifactFormat::Bincode, ArtifactFormat::Json] {
            let path = write_artifact(dir.path(), 3, &sample(), format)?;
            assert_eq!(path, dir.path().join(artifact_file_name(3, format)));
            assert_eq!(read_artifact(&path, format)?, sample());
        }

        // no temporary files are left behind
        assert_eq!(fs::read_dir(dir.path())?.count(), 2);
        Ok(())
    }

    #[test]
    fn test_write_overwrites() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut artifact = sample();
        write_artifact(dir.path(), 0, &artifact, ArtifactFormat::Bincode)?;
        artifact.image_size = [[480], [640]];
        let path = write_artifact(dir.path(), 0, &artifact, ArtifactFormat::Bincode)?;
        assert_eq!(read_artifact(path, ArtifactFormat::Bincode)?, artifact);
        Ok(())
    }

    #[test]
    fn test_write_invalid_dir() {
        let result = write_artifact(
            "/path/to/non/existent/directory",
            0,
            &sample(),
            ArtifactFormat::Bincode,
        );
        assert!(matches!(result, Err(CalibError::Io(_))));
    }

    #[test]
    fn test_decode_corrupted() {
        assert!(matches!(
            decode_artifact(&[0xff, 0x01], ArtifactFormat::Bincode),
            Err(CalibError::Decode(_))
        ));
        assert!(matches!(
            decode_artifact(b"{\"distortion\": [", ArtifactFormat::Json),
            Err(CalibError::Decode(_))
        ));
    }
}
