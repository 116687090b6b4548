use crate::error::{ErrorKind, Result};
use crate::path::{OutputDescriptor, default_stem};
use crate::{encode, merge, open};
use exn::ResultExt;
use quire_config::{Configuration, OutputFormat};
use quire_device::PageArtifact;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::instrument;

/// One output written to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Materialized {
    pub primary: PathBuf,
    /// Links to `primary`, one per alias tag, in tag order.
    pub aliases: Vec<PathBuf>,
}

/// A file ready to be copied to its destination.
enum Staged {
    /// Written by the device; owned by the session.
    Device(PathBuf),
    /// Produced here; removed when dropped.
    Temporary(NamedTempFile),
}
impl Staged {
    fn path(&self) -> &Path {
        match self {
            Self::Device(path) => path,
            Self::Temporary(file) => file.path(),
        }
    }
}

/// Files scanned pages under the configured directory, name and tags.
///
/// Destinations are `dir[/<tag>/<year>]/<stem>[.N].<ext>`. The first tag
/// holds the real file; every further tag gets a symbolic link to it. The
/// stem is the configured name, or `scan_HHMMSS` from the session start.
#[derive(Clone, Debug)]
pub struct OutputPipeline {
    dir: PathBuf,
    primary_tag: Option<String>,
    alias_tags: Vec<String>,
    stem: String,
    format: OutputFormat,
    year: i32,
    open: bool,
}
impl OutputPipeline {
    pub fn new(config: &Configuration, started_at: OffsetDateTime) -> Self {
        Self {
            dir: config.dir.clone(),
            primary_tag: config.primary_tag().map(str::to_string),
            alias_tags: config.alias_tags().to_vec(),
            stem: config.name.clone().unwrap_or_else(|| default_stem(started_at)),
            format: config.format,
            year: started_at.year(),
            open: config.open,
        }
    }

    /// Writes `pages` (in scan order) to their destinations.
    ///
    /// PDF output is one merged document; if merging fails nothing is
    /// written. TIFF and JPEG output is one file per page. A failed output
    /// skips its remaining aliases but does not stop later outputs; the call
    /// still fails if any output failed.
    #[instrument(skip_all, fields(pages = pages.len(), format = ?self.format))]
    pub async fn process(&self, pages: &[PageArtifact]) -> Result<Vec<Materialized>> {
        if pages.is_empty() {
            exn::bail!(ErrorKind::NoPages);
        }
        let staged = self.stage(pages).await?;
        let total = staged.len();
        let mut written = Vec::with_capacity(total);
        for source in &staged {
            let source = match source {
                Ok(source) => source,
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to encode page");
                    continue;
                },
            };
            match self.materialize(source.path()).await {
                Ok(output) => written.push(output),
                Err(e) => tracing::error!(error = ?e, source = %source.path().display(), "Failed to write output"),
            }
        }
        if written.len() < total {
            exn::bail!(ErrorKind::Incomplete { failed: total - written.len(), total });
        }
        if self.open {
            open::open_in_viewer(written.iter().map(|output| output.primary.as_path()));
        }
        Ok(written)
    }

    /// Produces the files to copy: one merged document, or one per page.
    async fn stage(&self, pages: &[PageArtifact]) -> Result<Vec<Result<Staged>>> {
        let pages = pages.to_vec();
        let format = self.format;
        tokio::task::spawn_blocking(move || -> Result<Vec<Result<Staged>>> {
            if format.is_merged() {
                return Ok(vec![Ok(Staged::Temporary(merge::merge(&pages)?))]);
            }
            Ok(pages
                .iter()
                .map(|page| match page {
                    PageArtifact::File { path, .. } => Ok(Staged::Device(path.clone())),
                    PageArtifact::Raster { .. } => encode::to_temp_file(page, format).map(Staged::Temporary),
                })
                .collect())
        })
        .await
        .or_raise(|| ErrorKind::Io)?
    }

    async fn materialize(&self, source: &Path) -> Result<Materialized> {
        let primary = self.place(self.primary_tag.as_deref()).await?;
        tracing::debug!(from = %source.display(), to = %primary.display(), "Copying output");
        tokio::fs::copy(source, &primary).await.or_raise(|| ErrorKind::Copy(primary.clone()))?;
        tracing::info!("Scanned to {}", primary.display());

        let target = std::path::absolute(&primary).or_raise(|| ErrorKind::Alias(primary.clone()))?;
        let mut aliases = Vec::with_capacity(self.alias_tags.len());
        for tag in &self.alias_tags {
            let alias = self.place(Some(tag)).await?;
            symlink(&target, &alias).await.or_raise(|| ErrorKind::Alias(alias.clone()))?;
            tracing::debug!(alias = %alias.display(), tag = %tag, "Aliased output");
            aliases.push(alias);
        }
        Ok(Materialized { primary, aliases })
    }

    /// Creates the directory for `tag` and picks the first free path in it.
    async fn place(&self, tag: Option<&str>) -> Result<PathBuf> {
        let descriptor = OutputDescriptor::new(&self.dir, tag, self.year, self.stem.as_str(), self.format.extension());
        tokio::fs::create_dir_all(&descriptor.root)
            .await
            .or_raise(|| ErrorKind::CreateDirectory(descriptor.root.clone()))?;
        Ok(descriptor.resolve().await)
    }
}

#[cfg(unix)]
async fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(windows)]
async fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink_file(target, link).await
}
