//! Headless export of a design to a ZIP bundle.
//!
//! Every view is rebuilt on its own [`RenderTarget`] from the stored records
//! and the garment rule, rasterized and encoded as PNG. Source images are
//! collected separately, deduplicated across views and numbered in the order
//! they are first seen. The archive layout is:
//!
//! ```text
//! views/front_mockup.png
//! views/back_mockup.png
//! views/left_mockup.png
//! views/right_mockup.png
//! assets/asset_<n>.<ext>
//! ```

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use image::RgbaImage;
use resvg::usvg::fontdb::Database;
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::config::{CanvasConfig, DesignerConfig};
use crate::error::{CodecError, ExportError};
use crate::fetch::{AssetFetcher, extension_for};
use crate::garment::GarmentRenderer;
use crate::raster::{RenderTarget, Rasterizer, encode_png};
use crate::scene::record::deserialize;
use crate::store::DesignState;
use crate::view::View;

// ============================================================================
// Output types
// ============================================================================

/// One file destined for the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportArchive {
    /// Suggested file name, e.g. `tshirt_design.zip`.
    pub file_name: String,
    /// The ZIP bytes.
    pub bytes: Vec<u8>,
    /// Archive entry paths, in write order.
    pub entries: Vec<String>,
    /// Views whose mockup could not be produced.
    pub failed_views: Vec<View>,
    /// Asset sources that could not be fetched.
    pub skipped_assets: Vec<String>,
}

impl ExportArchive {
    /// Writes the archive to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Writes the archive into `dir` under its suggested file name.
    pub fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let path = dir.as_ref().join(&self.file_name);
        self.save_to(&path)?;
        Ok(path)
    }
}

/// Source images collected for the archive.
#[derive(Debug, Clone, Default)]
pub struct CollectedAssets {
    pub staged: Vec<StagedFile>,
    pub skipped: Vec<String>,
}

// ============================================================================
// ExportCompositor
// ============================================================================

/// Reconstructs views off-session and packages them.
pub struct ExportCompositor {
    canvas: CanvasConfig,
    archive_name: String,
    renderer: GarmentRenderer,
    fetcher: Arc<dyn AssetFetcher>,
    rasterizer: Rasterizer,
}

impl std::fmt::Debug for ExportCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCompositor")
            .field("canvas", &self.canvas)
            .field("archive_name", &self.archive_name)
            .field("rasterizer", &self.rasterizer)
            .finish()
    }
}

impl ExportCompositor {
    pub fn new(config: &DesignerConfig, fetcher: Arc<dyn AssetFetcher>, fontdb: Arc<Database>) -> Self {
        Self {
            canvas: config.canvas.clone(),
            archive_name: config.archive_name.clone(),
            renderer: GarmentRenderer::new(config.garment.clone()),
            fetcher,
            rasterizer: Rasterizer::new(fontdb, config.fonts.fallback_family.clone()),
        }
    }

    /// Renders all four views, collects assets and builds the archive.
    ///
    /// A view that fails is listed in `failed_views`; only archive assembly
    /// can fail the export as a whole.
    #[instrument(skip_all, fields(color = %snapshot.garment_color))]
    pub async fn export(&self, snapshot: &DesignState) -> Result<ExportArchive, ExportError> {
        let renders = join_all(View::ALL.map(|view| self.render_view(snapshot, view)));
        let (renders, assets) = futures::join!(renders, self.collect_assets(snapshot));

        let mut files = Vec::with_capacity(View::ALL.len() + assets.staged.len());
        let mut failed_views = Vec::new();
        for (view, result) in View::ALL.into_iter().zip(renders) {
            match result {
                Ok(png) => files.push(StagedFile {
                    path: format!("views/{}_mockup.png", view),
                    bytes: png,
                }),
                Err(err) => {
                    warn!(%view, "View export failed: {}", err);
                    failed_views.push(view);
                }
            }
        }
        files.extend(assets.staged);

        let bytes = build_archive(&files)?;
        let entries: Vec<String> = files.into_iter().map(|file| file.path).collect();
        info!(
            entries = entries.len(),
            failed_views = failed_views.len(),
            skipped_assets = assets.skipped.len(),
            size = bytes.len(),
            "Export complete"
        );

        Ok(ExportArchive {
            file_name: self.archive_name.clone(),
            bytes,
            entries,
            failed_views,
            skipped_assets: assets.skipped,
        })
    }

    /// Renders one view to PNG bytes.
    pub async fn render_view(&self, snapshot: &DesignState, view: View) -> Result<Vec<u8>, ExportError> {
        let image = self.render_view_image(snapshot, view).await?;
        Ok(encode_png(&image)?)
    }

    /// Renders one view: backdrop, garment, then the view's objects in order.
    ///
    /// An unreachable garment asset leaves the bare canvas behind the design;
    /// a garment asset that arrives but cannot be decoded fails the view.
    pub async fn render_view_image(&self, snapshot: &DesignState, view: View) -> Result<RgbaImage, ExportError> {
        let mut target = RenderTarget::new(&self.canvas);

        let background = self.renderer.resolve(view, snapshot.garment_color);
        match self
            .renderer
            .background_object(&background, self.fetcher.as_ref())
            .await
        {
            Ok(object) => target.add(object),
            Err(CodecError::Fetch(err)) => {
                warn!(%view, asset = %background.asset, "Rendering without garment: {}", err)
            }
            Err(err) => {
                return Err(ExportError::Render {
                    view,
                    reason: err.to_string(),
                });
            }
        }

        let objects = deserialize(snapshot.records(view), self.fetcher.as_ref()).await;
        debug!(%view, objects = objects.len(), "Rasterizing view");
        target.extend(objects);

        Ok(self.rasterizer.rasterize(&target))
    }

    /// Fetches every distinct image source referenced by the design.
    ///
    /// Sources are numbered from 1 in first-seen order (front, back, left,
    /// right, then stored order). A failed fetch keeps its number, so the
    /// archive may have gaps.
    pub async fn collect_assets(&self, snapshot: &DesignState) -> CollectedAssets {
        let plan = asset_plan(snapshot);
        let fetched = join_all(plan.iter().map(|(_, src)| self.fetcher.fetch(src))).await;

        let mut collected = CollectedAssets::default();
        for ((number, src), result) in plan.into_iter().zip(fetched) {
            match result {
                Ok(asset) => {
                    let ext = extension_for(asset.effective_content_type().as_deref());
                    collected.staged.push(StagedFile {
                        path: format!("assets/asset_{}.{}", number, ext),
                        bytes: asset.bytes.to_vec(),
                    });
                }
                Err(err) => {
                    warn!(asset = number, "Skipping asset: {}", err);
                    collected.skipped.push(src);
                }
            }
        }
        collected
    }
}

/// Assigns archive numbers to distinct image sources in first-seen order.
pub fn asset_plan(snapshot: &DesignState) -> Vec<(usize, String)> {
    let mut seen = HashSet::new();
    let mut plan = Vec::new();
    for view in View::ALL {
        for record in snapshot.records(view) {
            for src in record.image_sources() {
                if seen.insert(src) {
                    plan.push((plan.len() + 1, src.to_string()));
                }
            }
        }
    }
    plan
}

/// Writes staged files into a deflate-compressed ZIP.
///
/// Entry timestamps are fixed, so the same files always give the same bytes.
pub fn build_archive(files: &[StagedFile]) -> Result<Vec<u8>, ExportError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for file in files {
        writer.start_file(file.path.as_str(), options)?;
        writer.write_all(&file.bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

// ============================================================================
// ExportJob
// ============================================================================

/// An export bound to the design as it was when the job was created.
#[derive(Debug)]
pub struct ExportJob {
    compositor: ExportCompositor,
    snapshot: DesignState,
}

impl ExportJob {
    pub fn new(compositor: ExportCompositor, snapshot: DesignState) -> Self {
        Self { compositor, snapshot }
    }

    pub fn snapshot(&self) -> &DesignState {
        &self.snapshot
    }

    pub async fn run(self) -> Result<ExportArchive, ExportError> {
        self.compositor.export(&self.snapshot).await
    }
}
