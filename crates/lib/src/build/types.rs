//! Types shared by the output builder and the build orchestrator.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::{ArchiveExtractor, ExtractError, Extractor};
use crate::cache::{CacheError, ContentCache, DownloadProgress, LogProgress};
use crate::checksum::ChecksumError;
use crate::config::ConfigError;
use crate::packager::{Packager, PackagerError};

/// Errors that can occur during a build.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("no archs specified")]
  NoArchs,

  #[error("no packagers specified")]
  NoPackagers,

  #[error("arch {0} is not supported")]
  UnsupportedArch(String),

  #[error("no download url template for arch {0}")]
  MissingUrlTemplate(String),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Download(#[from] CacheError),

  #[error("failed to extract archive: {0}")]
  Extract(#[from] ExtractError),

  #[error(transparent)]
  Package(#[from] PackagerError),

  #[error(transparent)]
  Checksum(#[from] ChecksumError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Collaborators a build runs against.
pub struct BuildContext {
  pub cache: ContentCache,
  pub extractor: Box<dyn Extractor>,
  pub packager: Packager,
  pub progress: Box<dyn DownloadProgress>,
}

impl BuildContext {
  /// Context using the default extractor, the `nfpm` executable and log-only progress.
  pub fn new(cache: ContentCache) -> Self {
    Self {
      cache,
      extractor: Box::new(ArchiveExtractor),
      packager: Packager::default(),
      progress: Box::new(LogProgress),
    }
  }

  pub fn with_extractor(mut self, extractor: impl Extractor + 'static) -> Self {
    self.extractor = Box::new(extractor);
    self
  }

  pub fn with_packager(mut self, packager: Packager) -> Self {
    self.packager = packager;
    self
  }

  pub fn with_progress(mut self, progress: impl DownloadProgress + 'static) -> Self {
    self.progress = Box::new(progress);
    self
  }
}

impl std::fmt::Debug for BuildContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildContext")
      .field("cache", &self.cache)
      .field("packager", &self.packager)
      .finish_non_exhaustive()
  }
}

/// What a successful build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
  /// Package files, in the order they were produced.
  pub packages: Vec<PathBuf>,

  /// Checksum manifest, when one was requested.
  pub manifest: Option<PathBuf>,
}
