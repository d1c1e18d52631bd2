//! Package builds.
//!
//! A build takes one package directory's configuration, a version and a list
//! of architectures, and produces one package per (architecture, format)
//! pair. Architectures are processed strictly in the order requested and the
//! first failure stops the build; packages already written stay on disk.
//!
//! # Submodules
//!
//! - [`output`] - Download, extraction and packaging of a single architecture
//! - [`types`] - Errors and the collaborators a build runs against

mod output;
mod types;

use std::path::PathBuf;

use tracing::info;

use crate::checksum::{self, ChecksumAlgorithm};
use crate::config::Config;

pub use types::*;

/// A build of one package directory.
#[derive(Debug, Clone)]
pub struct Builder {
  pub config: Config,
  pub version: String,
  pub archs: Vec<String>,
  pub packagers: Vec<String>,

  /// Where packages are written. Passed verbatim to the packager; relative
  /// paths are relative to `work_dir`.
  pub output_dir: PathBuf,

  /// The package directory. The packager runs here.
  pub work_dir: PathBuf,

  /// Write a checksum manifest into `output_dir` once every package exists.
  pub checksum: Option<ChecksumAlgorithm>,
}

impl Builder {
  /// Run the build.
  pub async fn build(&self, ctx: &BuildContext) -> Result<BuildSummary, BuildError> {
    if self.archs.is_empty() {
      return Err(BuildError::NoArchs);
    }
    if self.packagers.is_empty() {
      return Err(BuildError::NoPackagers);
    }

    info!(
      name = %self.config.name,
      version = %self.version,
      archs = ?self.archs,
      packagers = ?self.packagers,
      "building packages"
    );

    let mut summary = BuildSummary::default();
    for arch in &self.archs {
      let output = self
        .config
        .output(arch)
        .ok_or_else(|| BuildError::UnsupportedArch(arch.clone()))?;

      summary.packages.extend(output::build_output(self, output, ctx).await?);
    }

    if let Some(algorithm) = self.checksum {
      let output_dir = self.work_dir.join(&self.output_dir);
      summary.manifest = Some(checksum::write_manifest(&output_dir, algorithm)?);
    }

    Ok(summary)
  }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
  use super::*;
  use crate::archive::tests::tar_gz;
  use crate::archive::{ExtractError, Extractor, Renamer};
  use crate::cache::ContentCache;
  use crate::config::{DownloadBase, DownloadOverride, Output, PackagingBase, PackagingOverride};
  use crate::packager::tests::{calls, env_of_call, fake_packager};
  use crate::packager::{Packager, PackagerError};
  use std::fs::{self, File};
  use std::path::Path;
  use std::sync::Mutex;
  use tempfile::TempDir;

  struct Fixture {
    temp: TempDir,
    server: mockito::ServerGuard,
  }

  impl Fixture {
    async fn new() -> Self {
      let temp = TempDir::new().unwrap();
      fs::create_dir(temp.path().join("pkg")).unwrap();
      Self {
        temp,
        server: mockito::Server::new_async().await,
      }
    }

    fn logs(&self) -> &Path {
      self.temp.path()
    }

    fn work_dir(&self) -> PathBuf {
      self.temp.path().join("pkg")
    }

    fn context(&self, exit_code: i32) -> BuildContext {
      BuildContext::new(ContentCache::new(self.temp.path().join("cache")))
        .with_packager(Packager::new(fake_packager(self.logs(), exit_code)))
    }

    fn config(&self, archs: &[&str]) -> Config {
      Config {
        name: "foo".to_string(),
        download: DownloadBase {
          url_template: format!("{}/releases/${{VERSION}}/foo-${{ARCH}}.tar.gz", self.server.url()),
        },
        strip_components: 0,
        packaging: PackagingBase::default(),
        outputs: archs
          .iter()
          .map(|arch| Output {
            arch: arch.to_string(),
            download: DownloadOverride::default(),
            packaging: PackagingOverride::default(),
          })
          .collect(),
      }
    }

    fn builder(&self, config: Config, archs: &[&str]) -> Builder {
      Builder {
        config,
        version: "1.0.0".to_string(),
        archs: archs.iter().map(|a| a.to_string()).collect(),
        packagers: vec!["deb".to_string(), "rpm".to_string()],
        output_dir: PathBuf::from("build"),
        work_dir: self.work_dir(),
        checksum: None,
      }
    }

    fn call_prefix(&self) -> String {
      format!("{} package", self.work_dir().canonicalize().unwrap().display())
    }
  }

  fn env_value(env: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    env
      .iter()
      .find_map(|line| line.strip_prefix(&prefix).map(str::to_string))
  }

  #[tokio::test]
  async fn builds_every_format_for_an_arch() {
    let mut fx = Fixture::new().await;
    let mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-amd64.tar.gz")
      .with_body(tar_gz(&[("bin/tool", "#!/bin/sh\n")]))
      .expect(1)
      .create_async()
      .await;

    let builder = fx.builder(fx.config(&["amd64"]), &["amd64"]);
    let summary = builder.build(&fx.context(0)).await.unwrap();

    mock.assert_async().await;
    let prefix = fx.call_prefix();
    assert_eq!(
      calls(fx.logs()),
      vec![
        format!("{prefix} --packager deb --target build/foo_1.0.0_amd64.deb"),
        format!("{prefix} --packager rpm --target build/foo_1.0.0_amd64.rpm"),
      ]
    );
    assert_eq!(
      summary.packages,
      vec![
        fx.work_dir().join("build/foo_1.0.0_amd64.deb"),
        fx.work_dir().join("build/foo_1.0.0_amd64.rpm"),
      ]
    );
    assert_eq!(summary.manifest, None);

    let env = env_of_call(fx.logs(), 0);
    assert_eq!(env_value(&env, "NAME").as_deref(), Some("foo"));
    assert_eq!(env_value(&env, "VERSION").as_deref(), Some("1.0.0"));
    assert_eq!(env_value(&env, "ARCH").as_deref(), Some("amd64"));

    let listing = fs::read_to_string(fx.logs().join("archive-0.log")).unwrap();
    assert!(listing.contains("tool"), "archive not extracted: {listing}");
  }

  #[tokio::test]
  async fn scratch_directory_is_removed_after_packaging() {
    let mut fx = Fixture::new().await;
    let _mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-amd64.tar.gz")
      .with_body(tar_gz(&[("tool", "x")]))
      .create_async()
      .await;

    let builder = fx.builder(fx.config(&["amd64"]), &["amd64"]);
    builder.build(&fx.context(0)).await.unwrap();

    let archive_dir = env_value(&env_of_call(fx.logs(), 0), "ARCHIVE_DIR").unwrap();
    assert!(Path::new(&archive_dir).is_absolute());
    assert!(!Path::new(&archive_dir).exists());
  }

  #[tokio::test]
  async fn scratch_directory_is_removed_when_packaging_fails() {
    let mut fx = Fixture::new().await;
    let _mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-amd64.tar.gz")
      .with_body(tar_gz(&[("tool", "x")]))
      .create_async()
      .await;

    let builder = fx.builder(fx.config(&["amd64"]), &["amd64"]);
    let result = builder.build(&fx.context(1)).await;

    assert!(matches!(
      result,
      Err(BuildError::Package(PackagerError::Failed { ref format, .. })) if format == "deb"
    ));
    // The failing deb run stops the build before rpm.
    assert_eq!(calls(fx.logs()).len(), 1);

    let archive_dir = env_value(&env_of_call(fx.logs(), 0), "ARCHIVE_DIR").unwrap();
    assert!(!Path::new(&archive_dir).exists());
  }

  #[tokio::test]
  async fn strips_leading_components() {
    let mut fx = Fixture::new().await;
    let _mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-amd64.tar.gz")
      .with_body(tar_gz(&[("foo-1.0.0/bin/tool", "x"), ("foo-1.0.0/README", "y")]))
      .create_async()
      .await;

    let mut config = fx.config(&["amd64"]);
    config.strip_components = 1;
    let builder = fx.builder(config, &["amd64"]);
    builder.build(&fx.context(0)).await.unwrap();

    let listing = fs::read_to_string(fx.logs().join("archive-0.log")).unwrap();
    assert!(listing.contains("README"));
    assert!(listing.contains("/bin:"));
    assert!(!listing.contains("foo-1.0.0"));
  }

  #[tokio::test]
  async fn overrides_and_phase_variables() {
    let mut fx = Fixture::new().await;
    let mock = fx
      .server
      .mock("GET", "/dl/x86_64/foo.tgz")
      .with_body(tar_gz(&[("tool", "x")]))
      .expect(1)
      .create_async()
      .await;

    let mut config = fx.config(&["amd64"]);
    config.packaging.filename_template = "${NAME}-${VERSION}".to_string();
    config.outputs[0].download = DownloadOverride {
      url_template: format!("{}/dl/${{DL_ARCH}}/foo.tgz", fx.server.url()),
      env: [("DL_ARCH".to_string(), "x86_64".to_string())].into(),
    };
    config.outputs[0].packaging = PackagingOverride {
      filename_template: "${NAME}_${VERSION}-${RELEASE}_${ARCH}".to_string(),
      env: [("RELEASE".to_string(), "2".to_string())].into(),
    };

    let mut builder = fx.builder(config, &["amd64"]);
    builder.packagers = vec!["apk".to_string()];
    builder.build(&fx.context(0)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(
      calls(fx.logs()),
      vec![format!(
        "{} --packager apk --target build/foo_1.0.0-2_amd64.apk",
        fx.call_prefix()
      )]
    );

    let env = env_of_call(fx.logs(), 0);
    assert_eq!(env_value(&env, "RELEASE").as_deref(), Some("2"));
    assert_eq!(env_value(&env, "DL_ARCH"), None);
  }

  #[tokio::test]
  async fn base_filename_template_applies_without_override() {
    let mut fx = Fixture::new().await;
    let _mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-arm64.tar.gz")
      .with_body(tar_gz(&[("tool", "x")]))
      .create_async()
      .await;

    let mut config = fx.config(&["arm64"]);
    config.packaging.filename_template = "${NAME}-${VERSION}.${ARCH}".to_string();
    let mut builder = fx.builder(config, &["arm64"]);
    builder.packagers = vec!["rpm".to_string()];
    builder.build(&fx.context(0)).await.unwrap();

    assert_eq!(
      calls(fx.logs()),
      vec![format!(
        "{} --packager rpm --target build/foo-1.0.0.arm64.rpm",
        fx.call_prefix()
      )]
    );
  }

  #[tokio::test]
  async fn archs_are_built_in_request_order() {
    let mut fx = Fixture::new().await;
    let mut mocks = Vec::new();
    for arch in ["amd64", "arm64"] {
      let mock = fx
        .server
        .mock("GET", format!("/releases/1.0.0/foo-{arch}.tar.gz").as_str())
        .with_body(tar_gz(&[("tool", arch)]))
        .expect(1)
        .create_async()
        .await;
      mocks.push(mock);
    }

    let mut builder = fx.builder(fx.config(&["amd64", "arm64"]), &["arm64", "amd64"]);
    builder.packagers = vec!["deb".to_string()];
    builder.build(&fx.context(0)).await.unwrap();

    let prefix = fx.call_prefix();
    assert_eq!(
      calls(fx.logs()),
      vec![
        format!("{prefix} --packager deb --target build/foo_1.0.0_arm64.deb"),
        format!("{prefix} --packager deb --target build/foo_1.0.0_amd64.deb"),
      ]
    );
    for mock in &mocks {
      mock.assert_async().await;
    }
  }

  #[tokio::test]
  async fn unsupported_arch_stops_the_build() {
    let mut fx = Fixture::new().await;
    let _mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-amd64.tar.gz")
      .with_body(tar_gz(&[("tool", "x")]))
      .create_async()
      .await;

    let builder = fx.builder(fx.config(&["amd64"]), &["amd64", "s390x"]);
    let result = builder.build(&fx.context(0)).await;

    assert!(matches!(result, Err(BuildError::UnsupportedArch(ref arch)) if arch == "s390x"));
    // Packages of earlier archs are kept.
    assert!(fx.work_dir().join("build/foo_1.0.0_amd64.deb").exists());
  }

  #[tokio::test]
  async fn arch_matching_is_case_sensitive() {
    let mut fx = Fixture::new().await;
    let mock = fx.server.mock("GET", mockito::Matcher::Any).expect(0).create_async().await;

    let builder = fx.builder(fx.config(&["amd64"]), &["AMD64"]);
    let result = builder.build(&fx.context(0)).await;

    assert!(matches!(result, Err(BuildError::UnsupportedArch(_))));
    mock.assert_async().await;
    assert!(calls(fx.logs()).is_empty());
  }

  #[tokio::test]
  async fn empty_archs_or_packagers_are_rejected() {
    let fx = Fixture::new().await;

    let builder = fx.builder(fx.config(&["amd64"]), &[]);
    assert!(matches!(builder.build(&fx.context(0)).await, Err(BuildError::NoArchs)));

    let mut builder = fx.builder(fx.config(&["amd64"]), &["amd64"]);
    builder.packagers.clear();
    assert!(matches!(builder.build(&fx.context(0)).await, Err(BuildError::NoPackagers)));
  }

  #[tokio::test]
  async fn missing_url_template_is_an_error() {
    let fx = Fixture::new().await;
    let mut config = fx.config(&["amd64"]);
    config.download.url_template.clear();

    let builder = fx.builder(config, &["amd64"]);
    let result = builder.build(&fx.context(0)).await;

    assert!(matches!(result, Err(BuildError::MissingUrlTemplate(ref arch)) if arch == "amd64"));
    assert!(calls(fx.logs()).is_empty());
  }

  #[tokio::test]
  async fn download_failure_runs_no_packager() {
    let mut fx = Fixture::new().await;
    let _mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-amd64.tar.gz")
      .with_status(404)
      .create_async()
      .await;

    let builder = fx.builder(fx.config(&["amd64"]), &["amd64"]);
    let result = builder.build(&fx.context(0)).await;

    assert!(matches!(result, Err(BuildError::Download(_))));
    assert!(calls(fx.logs()).is_empty());
  }

  #[tokio::test]
  async fn writes_checksum_manifest_after_all_archs() {
    let mut fx = Fixture::new().await;
    let mut mocks = Vec::new();
    for arch in ["amd64", "arm64"] {
      let mock = fx
        .server
        .mock("GET", format!("/releases/1.0.0/foo-{arch}.tar.gz").as_str())
        .with_body(tar_gz(&[("tool", arch)]))
        .create_async()
        .await;
      mocks.push(mock);
    }

    let mut builder = fx.builder(fx.config(&["amd64", "arm64"]), &["amd64", "arm64"]);
    builder.checksum = Some(ChecksumAlgorithm::Sha256);
    let summary = builder.build(&fx.context(0)).await.unwrap();

    let manifest = fx.work_dir().join("build/SHA256SUM.txt");
    assert_eq!(summary.manifest, Some(manifest.clone()));

    let content = fs::read_to_string(manifest).unwrap();
    let names: Vec<&str> = content.lines().filter_map(|l| l.split_once(" *")).map(|(_, n)| n).collect();
    assert_eq!(
      names,
      vec![
        "foo_1.0.0_amd64.deb",
        "foo_1.0.0_amd64.rpm",
        "foo_1.0.0_arm64.deb",
        "foo_1.0.0_arm64.rpm",
      ]
    );
  }

  #[derive(Default)]
  struct RecordingExtractor {
    renamed: Mutex<Vec<Option<PathBuf>>>,
  }

  impl Extractor for RecordingExtractor {
    fn extract(&self, _archive: &mut File, dest: &Path, renamer: Option<Renamer<'_>>) -> Result<(), ExtractError> {
      let renamed = renamer.map_or(Some(PathBuf::from("top/bin/tool")), |r| r(Path::new("top/bin/tool")));
      self.renamed.lock().unwrap().push(renamed);
      fs::write(dest.join("marker"), "extracted")?;
      Ok(())
    }
  }

  #[tokio::test]
  async fn renamer_is_only_passed_when_stripping() {
    let mut fx = Fixture::new().await;
    let _mock = fx
      .server
      .mock("GET", "/releases/1.0.0/foo-amd64.tar.gz")
      .with_body("not inspected")
      .create_async()
      .await;

    for strip in [0, 2] {
      let extractor = std::sync::Arc::new(RecordingExtractor::default());
      let ctx = BuildContext {
        extractor: Box::new(SharedExtractor(extractor.clone())),
        ..fx.context(0)
      };

      let mut config = fx.config(&["amd64"]);
      config.strip_components = strip;
      fx.builder(config, &["amd64"]).build(&ctx).await.unwrap();

      let expected = if strip == 0 { "top/bin/tool" } else { "tool" };
      assert_eq!(*extractor.renamed.lock().unwrap(), vec![Some(PathBuf::from(expected))]);
    }
  }

  struct SharedExtractor(std::sync::Arc<RecordingExtractor>);

  impl Extractor for SharedExtractor {
    fn extract(&self, archive: &mut File, dest: &Path, renamer: Option<Renamer<'_>>) -> Result<(), ExtractError> {
      self.0.extract(archive, dest, renamer)
    }
  }
}
