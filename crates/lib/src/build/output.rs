//! Materializes the packages of a single output (architecture).

use std::fs::File;
use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};

use crate::archive::{Renamer, strip_components};
use crate::build::Builder;
use crate::build::types::{BuildContext, BuildError};
use crate::config::{Output, resolve_template};
use crate::consts::{DEFAULT_FILENAME_TEMPLATE, SCRATCH_PREFIX};
use crate::expand::Expander;

/// Download, extract and package one output.
///
/// Phases run in order: URL expansion, cache fetch, extraction into a
/// private scratch directory, filename expansion, then one packager run per
/// requested format. The scratch directory is removed when this returns,
/// whatever the outcome. Returns the package paths as seen from the
/// builder's working directory.
pub(crate) async fn build_output(
  builder: &Builder,
  output: &Output,
  ctx: &BuildContext,
) -> Result<Vec<PathBuf>, BuildError> {
  let config = &builder.config;

  let mut vars = Expander::new();
  vars.set("NAME", config.name.as_str());
  vars.set("VERSION", builder.version.as_str());
  vars.set("ARCH", output.arch.as_str());

  let url_template = resolve_template(&[
    output.download.url_template.as_str(),
    config.download.url_template.as_str(),
  ])
  .ok_or_else(|| BuildError::MissingUrlTemplate(output.arch.clone()))?;

  let mut download_vars = vars.clone();
  download_vars.extend(&output.download.env);
  let url = download_vars.expand(url_template);

  let cache_path = ctx.cache.fetch(&url, ctx.progress.as_ref()).await?;

  let scratch = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
  let archive_dir = std::path::absolute(scratch.path())?;

  let mut archive = File::open(&cache_path)?;
  let strip = strip_components(config.strip_components);
  let renamer = (config.strip_components > 0).then_some(&strip as Renamer<'_>);
  ctx.extractor.extract(&mut archive, &archive_dir, renamer)?;
  drop(archive);

  debug!(archive_dir = %archive_dir.display(), "archive extracted");
  vars.set("ARCHIVE_DIR", archive_dir.to_string_lossy());

  let filename_template = resolve_template(&[
    output.packaging.filename_template.as_str(),
    config.packaging.filename_template.as_str(),
    DEFAULT_FILENAME_TEMPLATE,
  ])
  .unwrap_or(DEFAULT_FILENAME_TEMPLATE);

  let mut packaging_vars = vars.clone();
  packaging_vars.extend(&output.packaging.env);
  let filename = packaging_vars.expand(filename_template);

  let mut packages = Vec::with_capacity(builder.packagers.len());
  for format in &builder.packagers {
    let target = builder.output_dir.join(format!("{filename}.{format}"));
    let on_disk = builder.work_dir.join(&target);
    if let Some(parent) = on_disk.parent() {
      fs::create_dir_all(parent).await?;
    }

    ctx
      .packager
      .package(format, &target, &builder.work_dir, &packaging_vars)
      .await?;
    packages.push(on_disk);
  }

  info!(arch = %output.arch, packages = packages.len(), "output packaged");
  drop(scratch);
  Ok(packages)
}
