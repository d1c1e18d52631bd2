//! Release archive extraction.
//!
//! The build pipeline only depends on the [`Extractor`] trait; the default
//! [`ArchiveExtractor`] understands tar (plain, gzip, zstd) and zip and picks
//! the format from the file's magic bytes.
//!
//! Entry paths can be rewritten before they are written through a
//! [`Renamer`]. [`strip_components`] builds the usual one: it drops a fixed
//! number of leading path segments, and entries that have no segments left
//! (typically the stripped top-level directories themselves) are skipped.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("unsupported archive format")]
  UnsupportedFormat,

  #[error("archive entry has an unsafe path: {0}")]
  UnsafePath(String),

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),
}

/// Maps an archive entry path to the path it is written to, relative to the
/// destination directory. `None` skips the entry.
pub type Renamer<'a> = &'a dyn Fn(&Path) -> Option<PathBuf>;

/// Extracts an archive into a directory.
pub trait Extractor: Send + Sync {
  fn extract(&self, archive: &mut File, dest: &Path, renamer: Option<Renamer<'_>>) -> Result<(), ExtractError>;
}

/// Build a renamer that removes `count` leading path segments.
///
/// `.` segments are ignored when counting.
pub fn strip_components(count: usize) -> impl Fn(&Path) -> Option<PathBuf> {
  move |path: &Path| {
    let stripped: PathBuf = path
      .components()
      .filter(|c| !matches!(c, Component::CurDir))
      .skip(count)
      .collect();

    if stripped.as_os_str().is_empty() {
      None
    } else {
      Some(stripped)
    }
  }
}

/// Archive container formats recognised by [`ArchiveExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  Tar,
  TarGz,
  TarZst,
  Zip,
}

impl ArchiveFormat {
  /// Detect the format from the leading bytes of a file.
  pub fn detect(header: &[u8]) -> Option<Self> {
    if header.starts_with(&[0x1f, 0x8b]) {
      Some(ArchiveFormat::TarGz)
    } else if header.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
      Some(ArchiveFormat::TarZst)
    } else if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
      Some(ArchiveFormat::Zip)
    } else if header.len() >= 262 && &header[257..262] == b"ustar" {
      Some(ArchiveFormat::Tar)
    } else {
      None
    }
  }
}

/// Default extractor for tar, tar.gz, tar.zst and zip archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl Extractor for ArchiveExtractor {
  fn extract(&self, archive: &mut File, dest: &Path, renamer: Option<Renamer<'_>>) -> Result<(), ExtractError> {
    let mut header = Vec::with_capacity(512);
    archive.by_ref().take(512).read_to_end(&mut header)?;
    archive.seek(SeekFrom::Start(0))?;

    let format = ArchiveFormat::detect(&header).ok_or(ExtractError::UnsupportedFormat)?;
    info!(?format, dest = %dest.display(), "extracting archive");

    fs::create_dir_all(dest)?;

    match format {
      ArchiveFormat::Tar => extract_tar(BufReader::new(archive), dest, renamer),
      ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(BufReader::new(archive)), dest, renamer),
      ArchiveFormat::TarZst => extract_tar(zstd::stream::Decoder::new(archive)?, dest, renamer),
      ArchiveFormat::Zip => extract_zip(archive, dest, renamer),
    }
  }
}

/// Apply the renamer and make sure the result stays inside the destination.
fn target_path(raw: &Path, renamer: Option<Renamer<'_>>) -> Result<Option<PathBuf>, ExtractError> {
  let renamed = match renamer {
    Some(rename) => match rename(raw) {
      Some(path) => path,
      None => return Ok(None),
    },
    None => raw.to_path_buf(),
  };

  let mut clean = PathBuf::new();
  for component in renamed.components() {
    match component {
      Component::Normal(part) => clean.push(part),
      Component::CurDir => {}
      _ => return Err(ExtractError::UnsafePath(raw.display().to_string())),
    }
  }

  if clean.as_os_str().is_empty() {
    Ok(None)
  } else {
    Ok(Some(clean))
  }
}

fn extract_tar<R: Read>(reader: R, dest: &Path, renamer: Option<Renamer<'_>>) -> Result<(), ExtractError> {
  let mut archive = tar::Archive::new(reader);
  archive.set_preserve_permissions(true);

  for entry in archive.entries()? {
    let mut entry = entry?;
    let raw = entry.path()?.into_owned();

    let Some(relative) = target_path(&raw, renamer)? else {
      debug!(path = %raw.display(), "skipping archive entry");
      continue;
    };

    let target = dest.join(&relative);
    if entry.header().entry_type().is_dir() {
      fs::create_dir_all(&target)?;
      continue;
    }

    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent)?;
    }

    // Hard link names are archive paths, so they get the same rewrite as the
    // entry itself and resolve inside the destination.
    if entry.header().entry_type() == tar::EntryType::Link {
      let source = entry
        .link_name()?
        .map(|name| name.into_owned())
        .ok_or_else(|| ExtractError::UnsafePath(raw.display().to_string()))?;
      let Some(source) = target_path(&source, renamer)? else {
        debug!(path = %raw.display(), link = %source.display(), "skipping hard link to skipped entry");
        continue;
      };
      if fs::symlink_metadata(&target).is_ok() {
        fs::remove_file(&target)?;
      }
      fs::hard_link(dest.join(source), &target)?;
      continue;
    }

    entry.unpack(&target)?;
  }

  Ok(())
}

fn extract_zip<R: Read + Seek>(reader: R, dest: &Path, renamer: Option<Renamer<'_>>) -> Result<(), ExtractError> {
  let mut archive = zip::ZipArchive::new(reader)?;

  for index in 0..archive.len() {
    let mut file = archive.by_index(index)?;
    let raw = file
      .enclosed_name()
      .ok_or_else(|| ExtractError::UnsafePath(file.name().to_string()))?;

    let Some(relative) = target_path(&raw, renamer)? else {
      debug!(path = %raw.display(), "skipping archive entry");
      continue;
    };

    let target = dest.join(&relative);
    if file.is_dir() {
      fs::create_dir_all(&target)?;
      continue;
    }

    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent)?;
    }
    let mut out = File::create(&target)?;
    io::copy(&mut file, &mut out)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = file.unix_mode() {
        fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
      }
    }
  }

  Ok(())
}
