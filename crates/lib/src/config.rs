//! Package configuration (`nfpm-helper.yml`).
//!
//! ```yaml
//! name: foo
//! download:
//!   url_template: https://example.com/foo/v${VERSION}/foo-${VERSION}-linux-${DL_ARCH}.tar.gz
//! strip_components: 1
//! packaging:
//!   filename_template: ${NAME}_${VERSION}_${ARCH}
//! outputs:
//!   - arch: amd64
//!     download:
//!       env:
//!         DL_ARCH: x86_64
//!   - arch: arm64
//!     download:
//!       env:
//!         DL_ARCH: aarch64
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while loading or validating configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("configuration has no name")]
  MissingName,

  #[error("output #{0} has no arch")]
  MissingArch(usize),

  #[error("arch '{0}' is declared by more than one output")]
  DuplicateArch(String),
}

/// Top-level declaration for one logical package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
  pub name: String,
  #[serde(default)]
  pub download: DownloadBase,
  #[serde(default)]
  pub strip_components: usize,
  #[serde(default)]
  pub packaging: PackagingBase,
  #[serde(default)]
  pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadBase {
  #[serde(default)]
  pub url_template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagingBase {
  #[serde(default)]
  pub filename_template: String,
}

/// One architecture variant of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Output {
  pub arch: String,
  #[serde(default)]
  pub download: DownloadOverride,
  #[serde(default)]
  pub packaging: PackagingOverride,
}

/// Download settings for a single output. Empty fields fall back to the base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadOverride {
  #[serde(default)]
  pub url_template: String,
  /// Extra variables visible only while expanding the download URL.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

/// Packaging settings for a single output. Empty fields fall back to the base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagingOverride {
  #[serde(default)]
  pub filename_template: String,
  /// Extra variables visible while expanding the filename and passed to the packager.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

impl Config {
  /// Load and validate a configuration file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let config: Config = load_yaml(path)?;
    config.validate()?;
    Ok(config)
  }

  /// Check the invariants serde cannot express.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.name.trim().is_empty() {
      return Err(ConfigError::MissingName);
    }

    let mut seen = HashSet::new();
    for (index, output) in self.outputs.iter().enumerate() {
      if output.arch.is_empty() {
        return Err(ConfigError::MissingArch(index));
      }
      if !seen.insert(output.arch.as_str()) {
        return Err(ConfigError::DuplicateArch(output.arch.clone()));
      }
    }

    Ok(())
  }

  /// First output declaring `arch`, compared case-sensitively.
  pub fn output(&self, arch: &str) -> Option<&Output> {
    self.outputs.iter().find(|output| output.arch == arch)
  }
}

/// Return the first non-empty candidate.
///
/// Callers list candidates from most to least specific, e.g.
/// `[output override, configuration base, built-in default]`.
pub fn resolve_template<'a>(candidates: &[&'a str]) -> Option<&'a str> {
  candidates.iter().copied().find(|candidate| !candidate.is_empty())
}

/// Strictly decode a YAML file; unknown keys are rejected by the target type.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
  let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source,
  })
}
