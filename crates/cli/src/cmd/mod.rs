mod build;
mod generate;

use std::path::PathBuf;

use anyhow::{Context, Result};

use nfpm_helper_lib::build::BuildContext;
use nfpm_helper_lib::cache::ContentCache;

use crate::output::{TerminalProgress, print_stat};

pub use build::{BuildArgs, cmd_build};
pub use generate::{GenerateArgs, cmd_generate};

/// Build context backed by the platform cache and a terminal progress bar.
fn build_context() -> Result<BuildContext> {
  let cache = ContentCache::from_platform().context("Failed to locate download cache")?;
  Ok(BuildContext::new(cache).with_progress(TerminalProgress::new()))
}

fn print_packages(packages: &[PathBuf]) {
  for package in packages {
    print_stat("Package", &package.display().to_string());
  }
}
