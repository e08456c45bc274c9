use argh::FromArgs;
use std::path::PathBuf;

use kornia_calib::{
    convert::{convert_dir, BatchPolicy, ConvertConfig},
    io::opencap::ArtifactFormat,
};

#[derive(FromArgs)]
/// Convert bioCV calibration files (files without extension) into OpenCap calibration files
struct Args {
    /// directory of the bioCV calibration files
    #[argh(option, short = 'i')]
    input_calib_folder: PathBuf,

    /// directory receiving the OpenCap files, defaults to the input directory
    #[argh(option, short = 'o')]
    output_dir: Option<PathBuf>,

    /// artifact format: bincode or json
    #[argh(option, default = "ArtifactFormat::Bincode")]
    format: ArtifactFormat,

    /// keep converting the other cameras when one fails
    #[argh(switch)]
    skip_failed: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config = ConvertConfig::new(args.input_calib_folder).with_format(args.format);
    if let Some(output_dir) = args.output_dir {
        config = config.with_output_dir(output_dir);
    }
    if args.skip_failed {
        config = config.with_policy(BatchPolicy::SkipFailed);
    }

    let report = convert_dir(&config)?;

    for camera in &report.converted {
        println!("{} -> {}", camera.name, camera.artifact_path.display());
    }
    for camera in &report.skipped {
        log::error!("{}: {}", camera.source_path.display(), camera.error);
    }

    println!(
        "Converted {} cameras into {}",
        report.converted.len(),
        config.output_dir().display()
    );

    if !report.skipped.is_empty() {
        return Err(format!("{} cameras failed to convert", report.skipped.len()).into());
    }

    Ok(())
}
