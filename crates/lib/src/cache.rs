//! Download cache for upstream release archives.
//!
//! Archives are stored at `{cache root}/downloads/{host}/{path}`, derived
//! from the URL alone. A file present at that path is treated as a complete
//! download; there is no expiry and no content verification.
//!
//! Downloads are streamed into a temporary file next to the final path and
//! renamed into place once the body has been fully written, so an
//! interrupted or cancelled transfer never leaves a truncated entry behind.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use percent_encoding::percent_decode_str;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace};
use url::Url;

use crate::platform::paths;

/// Errors that can occur while resolving or filling a cache entry.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("invalid download url '{url}': {source}")]
  InvalidUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("download url '{0}' has no host")]
  NoHost(String),

  #[error("download url '{0}' has no path")]
  NoPath(String),

  #[error("download url '{0}' points outside the download cache")]
  UnsafePath(String),

  #[error("could not determine the cache directory")]
  NoCacheDir,

  #[error("request for {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("download of {url} failed: HTTP {status}")]
  Status { url: String, status: StatusCode },

  #[error("download of {url} was interrupted: {source}")]
  Stream {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Receives progress notifications while a download is streamed to disk.
pub trait DownloadProgress: Send + Sync {
  /// A transfer is about to start. `total` is the advertised body length.
  fn started(&self, url: &str, total: Option<u64>);

  /// `bytes` more bytes have been written.
  fn advanced(&self, bytes: u64);

  /// The transfer ended, successfully or not.
  fn finished(&self);
}

/// Progress reporter that only emits tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl DownloadProgress for LogProgress {
  fn started(&self, url: &str, total: Option<u64>) {
    debug!(url, total, "transfer started");
  }

  fn advanced(&self, bytes: u64) {
    trace!(bytes, "received chunk");
  }

  fn finished(&self) {
    debug!("transfer finished");
  }
}

/// Maps download URLs to locally cached files.
#[derive(Debug, Clone)]
pub struct ContentCache {
  root: PathBuf,
  client: reqwest::Client,
}

impl ContentCache {
  /// Create a cache rooted at `root` (downloads land in `root/downloads`).
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      client: reqwest::Client::new(),
    }
  }

  /// Create a cache rooted at the platform cache directory.
  pub fn from_platform() -> Result<Self, CacheError> {
    paths::cache_dir().map(Self::new).ok_or(CacheError::NoCacheDir)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn downloads_dir(&self) -> PathBuf {
    self.root.join("downloads")
  }

  /// Deterministic cache location for `url`.
  ///
  /// The host keeps its explicit port, if any. Path segments are
  /// percent-decoded, and empty or `.` segments are ignored. Query strings
  /// and fragments do not contribute.
  pub fn cache_path(&self, url: &str) -> Result<PathBuf, CacheError> {
    let parsed = Url::parse(url).map_err(|source| CacheError::InvalidUrl {
      url: url.to_string(),
      source,
    })?;

    let host = parsed
      .host_str()
      .filter(|host| !host.is_empty())
      .ok_or_else(|| CacheError::NoHost(url.to_string()))?;
    let host = match parsed.port() {
      Some(port) => format!("{host}:{port}"),
      None => host.to_string(),
    };

    let mut path = self.downloads_dir().join(host);
    let mut segments = 0;
    for raw in parsed.path_segments().into_iter().flatten() {
      let decoded = percent_decode_str(raw).decode_utf8_lossy();
      // An encoded `/` splits into further segments
      for segment in decoded.split('/') {
        match segment {
          "" | "." => continue,
          ".." => return Err(CacheError::UnsafePath(url.to_string())),
          _ => {}
        }
        path.push(segment);
        segments += 1;
      }
    }

    if segments == 0 {
      return Err(CacheError::NoPath(url.to_string()));
    }

    Ok(path)
  }

  /// Return the cached file for `url`, downloading it first on a miss.
  pub async fn fetch(&self, url: &str, progress: &dyn DownloadProgress) -> Result<PathBuf, CacheError> {
    let cache_path = self.cache_path(url)?;

    if fs::try_exists(&cache_path).await? {
      debug!(url, path = %cache_path.display(), "using cached download");
      return Ok(cache_path);
    }

    info!(url, "downloading");

    let response = self.client.get(url).send().await.map_err(|source| CacheError::Request {
      url: url.to_string(),
      source,
    })?;

    if response.status() != StatusCode::OK {
      return Err(CacheError::Status {
        url: url.to_string(),
        status: response.status(),
      });
    }

    if let Some(parent) = cache_path.parent() {
      fs::create_dir_all(parent).await?;
    }

    progress.started(url, response.content_length());
    let result = persist_stream(url, response.bytes_stream(), &cache_path, progress).await;
    progress.finished();
    let size = result?;

    info!(path = %cache_path.display(), size, "download complete");
    Ok(cache_path)
  }
}

/// Write a byte stream to `dest`, all or nothing.
///
/// The body goes to a temporary file in the destination directory which is
/// renamed onto `dest` only after the last chunk has been flushed. On any
/// error the temporary file is removed and `dest` is left untouched.
pub async fn persist_stream<S, E>(
  url: &str,
  stream: S,
  dest: &Path,
  progress: &dyn DownloadProgress,
) -> Result<u64, CacheError>
where
  S: Stream<Item = Result<Bytes, E>>,
  E: std::error::Error + Send + Sync + 'static,
{
  let parent = dest.parent().unwrap_or_else(|| Path::new("."));
  let partial = tempfile::Builder::new()
    .prefix(".download-")
    .suffix(".part")
    .tempfile_in(parent)?;
  let mut file = fs::File::from_std(partial.reopen()?);

  let mut stream = std::pin::pin!(stream);
  let mut written: u64 = 0;

  while let Some(chunk) = stream.next().await {
    let chunk = chunk.map_err(|source| CacheError::Stream {
      url: url.to_string(),
      source: Box::new(source),
    })?;
    file.write_all(&chunk).await?;
    written += chunk.len() as u64;
    progress.advanced(chunk.len() as u64);
  }

  file.flush().await?;
  file.sync_all().await?;
  drop(file);

  partial.persist(dest).map_err(|e| CacheError::Io(e.error))?;
  Ok(written)
}
