//! Implementation of the `nfpm-helper build` command.
//!
//! Builds every requested architecture and format of one package directory.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use nfpm_helper_lib::build::Builder;
use nfpm_helper_lib::checksum::ChecksumAlgorithm;
use nfpm_helper_lib::config::Config;
use nfpm_helper_lib::consts::CONFIG_FILE;

use crate::cmd::{build_context, print_packages};
use crate::output::{format_duration, print_stat, print_success};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Package directory containing nfpm-helper.yml
  #[arg(default_value = ".")]
  pub directory: PathBuf,

  /// Directory packages are written to
  #[arg(long, env = "OUTPUT_DIR", default_value = "build")]
  pub output_dir: PathBuf,

  /// Package version
  #[arg(long, env = "VERSION")]
  pub version: String,

  /// Architectures to build, comma-separated
  #[arg(long, env = "ARCHS", value_delimiter = ',', required = true)]
  pub archs: Vec<String>,

  /// Package formats to produce, comma-separated
  #[arg(long, env = "PACKAGERS", value_delimiter = ',', default_value = "deb,rpm")]
  pub packagers: Vec<String>,

  /// Write a checksum manifest into the output directory (sha256)
  #[arg(long, env = "CHECKSUM")]
  pub checksum: Option<ChecksumAlgorithm>,
}

/// Execute the build command.
///
/// Loads `nfpm-helper.yml` from the package directory and builds each
/// architecture in the order given. The output directory is resolved against
/// the invocation directory.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();

  let work_dir = dunce::canonicalize(&args.directory)
    .with_context(|| format!("Package directory not found: {}", args.directory.display()))?;
  let config = Config::load(&work_dir.join(CONFIG_FILE)).context("Failed to load package configuration")?;
  let output_dir = std::path::absolute(&args.output_dir).context("Failed to resolve output directory")?;

  let builder = Builder {
    config,
    version: args.version,
    archs: args.archs,
    packagers: args.packagers,
    output_dir,
    work_dir,
    checksum: args.checksum,
  };

  let ctx = build_context()?;
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = rt
    .block_on(builder.build(&ctx))
    .with_context(|| format!("Build of {} {} failed", builder.config.name, builder.version))?;

  println!();
  print_success(&format!(
    "Built {} {} in {}",
    builder.config.name,
    builder.version,
    format_duration(start.elapsed())
  ));
  print_packages(&summary.packages);
  if let Some(manifest) = &summary.manifest {
    print_stat("Checksums", &manifest.display().to_string());
  }

  Ok(())
}
