//! Invocation of the external packaging tool.
//!
//! Each package format is produced by one run of
//! `nfpm package --packager <format> --target <path>`. The child inherits the
//! full process environment with the expander's variables layered on top, so
//! the tool's own configuration can reference `${ARCHIVE_DIR}`, `${VERSION}`
//! and any packaging-phase variables.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::PACKAGER_PROGRAM;
use crate::expand::Expander;

#[derive(Debug, Error)]
pub enum PackagerError {
  #[error("failed to launch '{program}': {source}")]
  Launch {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("packaging {format} to {target} failed with exit code {code:?}")]
  Failed {
    format: String,
    target: PathBuf,
    code: Option<i32>,
  },
}

/// Runs the external packaging executable.
#[derive(Debug, Clone)]
pub struct Packager {
  program: OsString,
}

impl Default for Packager {
  fn default() -> Self {
    Self::new(PACKAGER_PROGRAM)
  }
}

impl Packager {
  pub fn new(program: impl Into<OsString>) -> Self {
    Self { program: program.into() }
  }

  pub fn program(&self) -> &OsString {
    &self.program
  }

  /// Produce one package of `format` at `target`.
  ///
  /// The tool runs in `work_dir`, where it looks for its own configuration.
  /// The child is killed if the returned future is dropped before it exits.
  pub async fn package(&self, format: &str, target: &Path, work_dir: &Path, vars: &Expander) -> Result<(), PackagerError> {
    info!(format, target = %target.display(), "packaging");

    let mut command = Command::new(&self.program);
    command
      .arg("package")
      .arg("--packager")
      .arg(format)
      .arg("--target")
      .arg(target)
      .current_dir(work_dir)
      .envs(vars.vars())
      .kill_on_drop(true);

    debug!(program = ?self.program, work_dir = %work_dir.display(), vars = vars.len(), "spawning packager");

    let status = command.status().await.map_err(|source| PackagerError::Launch {
      program: self.program.to_string_lossy().into_owned(),
      source,
    })?;

    if !status.success() {
      return Err(PackagerError::Failed {
        format: format.to_string(),
        target: target.to_path_buf(),
        code: status.code(),
      });
    }

    Ok(())
  }
}
