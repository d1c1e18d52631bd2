//! Package-set generation across repositories.
//!
//! The generator configuration lists repositories and, per repository, the
//! packages to build. Each repository root carries an index mapping package
//! names to package directories; every package directory carries its own
//! build configuration. Repositories and packages are processed in order and
//! the first failure stops the run.
//!
//! # Submodules
//!
//! - [`git`] - Fresh git checkouts at a branch, tag or revision
//! - [`types`] - Generator and index descriptors

pub mod git;
mod types;

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::info;

use crate::build::{BuildContext, BuildError, Builder};
use crate::config::{Config, ConfigError};
use crate::consts::{CONFIG_FILE, INDEX_FILE, SCRATCH_PREFIX};
use crate::expand::expand_env;

pub use git::{FetchError, GitFetcher, RepositoryFetcher};
pub use types::*;

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("package '{0}' not found")]
  PackageNotFound(String),

  #[error("package '{0}' is listed more than once in the index")]
  DuplicatePackage(String),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("failed to build {name} {version}: {source}")]
  Build {
    name: String,
    version: String,
    #[source]
    source: BuildError,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Builds every requested package of every configured repository.
#[derive(Debug, Clone)]
pub struct Generator {
  pub config: GenerateConfig,

  /// Used for packages that do not name their own packagers.
  pub packagers: Vec<String>,

  /// Shared by every build. Relative paths are relative to each package directory.
  pub output_dir: PathBuf,

  /// Relative local repository sources are resolved against this directory.
  pub base_dir: PathBuf,
}

impl Generator {
  /// Run every build. Returns the produced package paths.
  ///
  /// Git clones live in temporary directories that are removed when this returns.
  pub async fn generate(
    &self,
    ctx: &BuildContext,
    fetcher: &dyn RepositoryFetcher,
  ) -> Result<Vec<PathBuf>, GenerateError> {
    let mut clones: Vec<TempDir> = Vec::new();
    let mut packages = Vec::new();

    for repository in &self.config.repositories {
      let root = self.resolve_repository(repository, fetcher, &mut clones)?;
      let index = IndexConfig::load(&root.join(INDEX_FILE))?;

      for request in &repository.packages {
        let entry = find_package(&index, &request.name)?;
        let package_dir = root.join(expand_env(&entry.dir));
        info!(name = %request.name, version = %request.version, dir = %package_dir.display(), "generating");

        let config = Config::load(&package_dir.join(CONFIG_FILE))?;
        let packagers = if request.packagers.is_empty() {
          self.packagers.clone()
        } else {
          request.packagers.clone()
        };

        let builder = Builder {
          config,
          version: request.version.clone(),
          archs: request.archs.clone(),
          packagers,
          output_dir: self.output_dir.clone(),
          work_dir: package_dir,
          checksum: None,
        };

        let summary = builder.build(ctx).await.map_err(|source| GenerateError::Build {
          name: request.name.clone(),
          version: request.version.clone(),
          source,
        })?;
        packages.extend(summary.packages);
      }
    }

    Ok(packages)
  }

  fn resolve_repository(
    &self,
    repository: &RepositoryConfig,
    fetcher: &dyn RepositoryFetcher,
    clones: &mut Vec<TempDir>,
  ) -> Result<PathBuf, GenerateError> {
    match repository.kind {
      SourceKind::Local => {
        let source = expand_env(&repository.source);
        info!(source = %source, "using local repository");
        Ok(self.base_dir.join(Path::new(&source)))
      }
      SourceKind::Git => {
        let dir = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        let version = Some(repository.version.as_str()).filter(|v| !v.is_empty());
        fetcher.fetch(&repository.source, version, dir.path())?;

        let root = dir.path().to_path_buf();
        clones.push(dir);
        Ok(root)
      }
    }
  }
}

fn find_package<'a>(index: &'a IndexConfig, name: &str) -> Result<&'a IndexEntry, GenerateError> {
  let mut matches = index.packages.iter().filter(|entry| entry.name == name);
  let entry = matches
    .next()
    .ok_or_else(|| GenerateError::PackageNotFound(name.to_string()))?;

  if matches.next().is_some() {
    return Err(GenerateError::DuplicatePackage(name.to_string()));
  }
  Ok(entry)
}
