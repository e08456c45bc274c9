/// Reader for bioCV calibration files.
pub mod biocv;

/// Reader and writer for OpenCap calibration artifacts.
pub mod opencap;
