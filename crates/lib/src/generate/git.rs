//! Git checkouts for generator repositories.
//!
//! Every git repository is cloned fresh into a directory owned by the caller.
//! Without a version the remote's default branch is checked out. With one,
//! the version is resolved as a branch first, then as a tag, then as an
//! arbitrary revision expression, and the tree of the resulting commit is
//! written into the worktree.

use std::fs;
use std::path::{Path, PathBuf};

use gix::objs::tree::EntryKind;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while fetching a repository.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Failed to clone a git repository.
  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The version is neither a branch, a tag nor a revision.
  #[error("version '{rev}' not found in repository")]
  RevisionNotFound { rev: String },

  /// Failed to check out a revision.
  #[error("failed to checkout '{rev}': {source}")]
  Checkout {
    rev: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Produces a repository's sources in a local directory.
pub trait RepositoryFetcher: Send + Sync {
  /// Clone `url` into the empty directory `dest` and check out `version`,
  /// or the default branch when `version` is `None`.
  fn fetch(&self, url: &str, version: Option<&str>, dest: &Path) -> Result<(), FetchError>;
}

/// How a version string was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
  Branch,
  Tag,
  Revision,
}

/// [`RepositoryFetcher`] backed by gix.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitFetcher;

impl RepositoryFetcher for GitFetcher {
  fn fetch(&self, url: &str, version: Option<&str>, dest: &Path) -> Result<(), FetchError> {
    info!(url, version, "cloning git repository");

    let Some(version) = version else {
      clone_default_branch(url, dest)?;
      return Ok(());
    };

    let repo = clone_without_checkout(url, dest)?;
    let (kind, id) = resolve_version(&repo, version)?;
    info!(version, kind = ?kind, commit = %id, "checking out");

    write_tree(&repo, id, dest).map_err(|source| FetchError::Checkout {
      rev: version.to_string(),
      source,
    })
  }
}

fn clone_default_branch(url: &str, dest: &Path) -> Result<gix::Repository, FetchError> {
  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| FetchError::Clone {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| FetchError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| FetchError::Checkout {
      rev: "HEAD".to_string(),
      source: Box::new(e),
    })?;

  Ok(repo)
}

fn clone_without_checkout(url: &str, dest: &Path) -> Result<gix::Repository, FetchError> {
  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| FetchError::Clone {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  let (repo, _outcome) = prepared
    .fetch_only(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| FetchError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  Ok(repo)
}

/// Resolve `version` to an object id: branch, then tag, then revision.
pub fn resolve_version(repo: &gix::Repository, version: &str) -> Result<(RefKind, gix::ObjectId), FetchError> {
  let candidates = [
    (RefKind::Branch, format!("refs/remotes/origin/{version}")),
    (RefKind::Branch, format!("refs/heads/{version}")),
    (RefKind::Tag, format!("refs/tags/{version}")),
    (RefKind::Revision, version.to_string()),
  ];

  for (kind, spec) in &candidates {
    match repo.rev_parse_single(spec.as_str()) {
      Ok(id) => return Ok((*kind, id.detach())),
      Err(e) => debug!(spec = %spec, error = %e, "not resolvable"),
    }
  }

  Err(FetchError::RevisionNotFound {
    rev: version.to_string(),
  })
}

/// Write the tree of the commit `id` points at into `dest`.
fn write_tree(
  repo: &gix::Repository,
  id: gix::ObjectId,
  dest: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  let commit = repo.find_object(id)?.peel_to_commit()?;
  let tree = commit.tree()?;

  let mut recorder = gix::traverse::tree::Recorder::default();
  tree.traverse().breadthfirst(&mut recorder)?;

  for entry in recorder.records {
    let path = dest.join(gix::path::try_from_byte_slice(entry.filepath.as_slice())?);
    let io_err = |source| FetchError::Write {
      path: path.clone(),
      source,
    };

    match entry.mode.kind() {
      EntryKind::Tree | EntryKind::Commit => {
        fs::create_dir_all(&path).map_err(io_err)?;
      }
      EntryKind::Blob | EntryKind::BlobExecutable => {
        let data = repo.find_object(entry.oid)?.data.clone();
        if let Some(parent) = path.parent() {
          fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, data).map_err(io_err)?;
        #[cfg(unix)]
        {
          use std::os::unix::fs::PermissionsExt;
          if entry.mode.kind() == EntryKind::BlobExecutable {
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(io_err)?;
          }
        }
      }
      EntryKind::Link => {
        let target = repo.find_object(entry.oid)?.data.clone();
        if let Some(parent) = path.parent() {
          fs::create_dir_all(parent).map_err(io_err)?;
        }
        #[cfg(unix)]
        {
          use std::os::unix::ffi::OsStrExt;
          std::os::unix::fs::symlink(std::ffi::OsStr::from_bytes(&target), &path).map_err(io_err)?;
        }
        #[cfg(not(unix))]
        {
          fs::write(&path, target).map_err(io_err)?;
        }
      }
    }
  }

  Ok(())
}
