//! File checksums and the output-directory checksum manifest.
//!
//! The manifest lists every regular file under the output directory, except
//! the manifest itself, one line per file:
//!
//! ```text
//! 3a7bd3e2360a3d29eea436fcfb7e44c735d117c42d1c1835420b6b9942dd4f1b *foo_1.0.0_amd64.deb
//! ```

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ChecksumError {
  #[error("unsupported checksum algorithm '{0}'")]
  Unsupported(String),

  #[error("failed to read {path}: {source}")]
  ReadFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to write manifest {path}: {source}")]
  WriteManifest {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
  Sha256,
}

impl ChecksumAlgorithm {
  pub fn as_str(self) -> &'static str {
    match self {
      ChecksumAlgorithm::Sha256 => "sha256",
    }
  }

  /// Name of the manifest file written into the output directory.
  pub fn manifest_name(self) -> &'static str {
    match self {
      ChecksumAlgorithm::Sha256 => "SHA256SUM.txt",
    }
  }
}

impl fmt::Display for ChecksumAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ChecksumAlgorithm {
  type Err = ChecksumError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "sha256" => Ok(ChecksumAlgorithm::Sha256),
      other => Err(ChecksumError::Unsupported(other.to_string())),
    }
  }
}

/// Stream a file through `algorithm` and return the lowercase hex digest.
pub fn checksum_file(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, ChecksumError> {
  let read_err = |source| ChecksumError::ReadFile {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;

  match algorithm {
    ChecksumAlgorithm::Sha256 => {
      let mut hasher = Sha256::new();
      io::copy(&mut file, &mut hasher).map_err(read_err)?;
      Ok(hex::encode(hasher.finalize()))
    }
  }
}

/// Write the checksum manifest for every regular file under `output_dir`.
///
/// Any previous manifest is overwritten. Entries are sorted by path and use
/// `/` separators. Returns the manifest path.
pub fn write_manifest(output_dir: &Path, algorithm: ChecksumAlgorithm) -> Result<PathBuf, ChecksumError> {
  let manifest_path = output_dir.join(algorithm.manifest_name());
  let mut lines = Vec::new();

  for entry in WalkDir::new(output_dir).sort_by_file_name() {
    let entry = entry.map_err(|source| ChecksumError::Walk {
      path: output_dir.to_path_buf(),
      source,
    })?;

    if !entry.file_type().is_file() || entry.path() == manifest_path {
      continue;
    }

    let rel_path = entry
      .path()
      .strip_prefix(output_dir)
      .unwrap_or(entry.path())
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");

    let digest = checksum_file(entry.path(), algorithm)?;
    debug!(file = %rel_path, %digest, "checksummed");
    lines.push(format!("{digest} *{rel_path}\n"));
  }

  let write_err = |source| ChecksumError::WriteManifest {
    path: manifest_path.clone(),
    source,
  };
  let mut file = fs::File::create(&manifest_path).map_err(write_err)?;
  for line in &lines {
    file.write_all(line.as_bytes()).map_err(write_err)?;
  }

  info!(path = %manifest_path.display(), files = lines.len(), algorithm = %algorithm, "wrote checksum manifest");
  Ok(manifest_path)
}
