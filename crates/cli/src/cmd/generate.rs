//! Implementation of the `nfpm-helper generate` command.
//!
//! Builds the packages listed in a generator configuration, across local
//! directories and fresh git clones.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use nfpm_helper_lib::consts::GENERATE_FILE;
use nfpm_helper_lib::generate::{GenerateConfig, Generator, GitFetcher};

use crate::cmd::{build_context, print_packages};
use crate::output::{format_duration, print_info, print_success};

#[derive(Debug, Args)]
pub struct GenerateArgs {
  /// Generator configuration file
  #[arg(long, default_value = GENERATE_FILE)]
  pub config: PathBuf,

  /// Package formats for packages that do not name their own, comma-separated
  #[arg(long, env = "PACKAGERS", value_delimiter = ',', default_value = "deb,rpm")]
  pub packagers: Vec<String>,

  /// Directory every package is written to
  #[arg(long, env = "OUTPUT_DIR", default_value = "build")]
  pub output_dir: PathBuf,
}

/// Execute the generate command.
pub fn cmd_generate(args: GenerateArgs) -> Result<()> {
  let start = Instant::now();

  let config = GenerateConfig::load(&args.config).context("Failed to load generator configuration")?;
  let base_dir = std::env::current_dir().context("Failed to determine current directory")?;
  let output_dir = base_dir.join(&args.output_dir);

  print_info(&format!(
    "Generating from {} repositories",
    config.repositories.len()
  ));

  let generator = Generator {
    config,
    packagers: args.packagers,
    output_dir,
    base_dir,
  };

  let ctx = build_context()?;
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let packages = rt
    .block_on(generator.generate(&ctx, &GitFetcher))
    .context("Generate failed")?;

  println!();
  print_success(&format!(
    "Generated {} packages in {}",
    packages.len(),
    format_duration(start.elapsed())
  ));
  print_packages(&packages);

  Ok(())
}
