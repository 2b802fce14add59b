//! Removes the power-on register writes trackers put at the start of Game
//! Boy VGM exports, and fixes up the header offsets.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use libvgm::{patch, patch_file, PatchConfig, PatchReport, VersionPolicy};
use rayon::prelude::*;

#[derive(Parser)]
#[command(name = "vgm-strip")]
#[command(about = "Strip init register writes from VGM files")]
#[command(version)]
struct Cli {
    /// VGM files to patch
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory for the patched files [default: ../output next to each input]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// TOML file with the register ranges and version policy
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Refuse files older than the minimum supported version
    #[arg(long)]
    reject_old: bool,

    /// Report what would be removed without writing anything
    #[arg(long)]
    dry_run: bool,
}

fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("..")
            .join("output"),
    };
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(".vgm");

    dir.join(name)
}

fn run_one(
    input: &Path,
    output_dir: Option<&Path>,
    config: &PatchConfig,
    dry_run: bool,
) -> Result<PatchReport> {
    if dry_run {
        let data = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        return Ok(patch(&data, config)?.report);
    }

    let output = output_path(input, output_dir);
    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let report = patch_file(input, &output, config)
        .with_context(|| format!("patching {}", input.display()))?;
    tracing::info!("{} -> {}", input.display(), output.display());

    Ok(report)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            PatchConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => PatchConfig::default(),
    };
    if cli.reject_old {
        config.on_unsupported_version = VersionPolicy::Reject;
    }

    let results = cli
        .files
        .par_iter()
        .map(|input| (input, run_one(input, cli.output_dir.as_deref(), &config, cli.dry_run)))
        .collect::<Vec<_>>();

    let mut failed = 0;
    for (input, result) in results {
        match result {
            Ok(report) => {
                let registers = report
                    .stripped
                    .iter()
                    .map(|r| format!("0x{:02X}", r))
                    .collect::<Vec<_>>()
                    .join(" ");
                tracing::info!(
                    "{}: v{}, removed {} bytes [{}], {} warnings",
                    input.display(),
                    report.version,
                    report.bytes_removed,
                    registers,
                    report.warnings.len()
                );
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed", failed, cli.files.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_next_to_input_dir() {
        assert_eq!(
            output_path(Path::new("input/song.vgm"), None),
            PathBuf::from("input/../output/song.vgm")
        );
    }

    #[test]
    fn test_output_dir_and_extension() {
        assert_eq!(
            output_path(Path::new("songs/track.v1.bin"), Some(Path::new("out"))),
            PathBuf::from("out/track.v1.vgm")
        );
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config = PatchConfig::from_toml_str(include_str!("../strip.example.toml")).unwrap();
        assert_eq!(config, PatchConfig::default());
    }
}
