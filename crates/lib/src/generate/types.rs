//! Generator and index descriptors.

use std::path::Path;

use serde::Deserialize;

use crate::config::{ConfigError, load_yaml};

/// Contents of the generator configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateConfig {
  #[serde(default)]
  pub repositories: Vec<RepositoryConfig>,
}

impl GenerateConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    load_yaml(path)
  }
}

/// Where a repository's sources come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SourceKind {
  /// A directory on the local filesystem.
  #[default]
  #[serde(rename = "local", alias = "")]
  Local,

  /// A git remote, cloned fresh for every run.
  #[serde(rename = "git")]
  Git,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
  /// Local directory or clone URL.
  pub source: String,

  /// Branch, tag or revision to check out. Git repositories only.
  #[serde(default)]
  pub version: String,

  #[serde(default, rename = "type")]
  pub kind: SourceKind,

  #[serde(default)]
  pub packages: Vec<PackageRequest>,
}

/// A package to build out of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageRequest {
  pub name: String,

  #[serde(default)]
  pub version: String,

  #[serde(default)]
  pub archs: Vec<String>,

  /// Overrides the generator's packager list when non-empty.
  #[serde(default)]
  pub packagers: Vec<String>,
}

/// Contents of a repository's index file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
  #[serde(default)]
  pub packages: Vec<IndexEntry>,
}

impl IndexConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    load_yaml(path)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexEntry {
  pub name: String,

  /// Package directory, relative to the repository root.
  pub dir: String,
}
