//! Off-screen rasterization of scene objects.
//!
//! A [`RenderTarget`] is a non-interactive stand-in for the drawing surface:
//! a fixed-size canvas with a backdrop and a stack of objects. The
//! [`Rasterizer`] turns it into pixels by rendering each object on its own
//! layer through resvg and compositing the layers bottom-up.

pub(crate) mod markup;
pub mod svg;

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgba, RgbaImage};
use resvg::usvg::{Options, fontdb};
use tracing::warn;

use crate::config::CanvasConfig;
use crate::fonts::TextLayout;
use crate::garment::apply_filter;
use crate::geometry::SizePx;
use crate::scene::{ImageContent, ImageFilter, SceneObject};

// ============================================================================
// RenderTarget
// ============================================================================

/// An isolated canvas used for export.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    size: SizePx,
    backdrop: [u8; 3],
    objects: Vec<SceneObject>,
}

impl RenderTarget {
    pub fn new(canvas: &CanvasConfig) -> Self {
        Self {
            size: SizePx::new(canvas.width, canvas.height),
            backdrop: canvas.background,
            objects: Vec::new(),
        }
    }

    pub fn size(&self) -> SizePx {
        self.size
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn add(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn extend(&mut self, objects: impl IntoIterator<Item = SceneObject>) {
        self.objects.extend(objects);
    }
}

// ============================================================================
// Rasterizer
// ============================================================================

/// Cache key for filtered raster payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    src: String,
    filters: Vec<([u8; 3], u64)>,
}

impl CacheKey {
    fn new(image: &ImageContent) -> Self {
        let filters = image
            .filters
            .iter()
            .map(|filter| match filter {
                ImageFilter::BlendColor { color, alpha, .. } => {
                    let (r, g, b) = color.rgb();
                    ([r, g, b], alpha.to_bits())
                }
            })
            .collect();
        Self {
            src: image.src.clone(),
            filters,
        }
    }
}

/// Renders render targets to RGBA images.
pub struct Rasterizer {
    fontdb: Arc<fontdb::Database>,
    fallback_family: String,
    /// Raster payloads re-encoded as PNG data URIs, filters applied.
    encoded: Mutex<HashMap<CacheKey, Arc<str>>>,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("faces", &self.fontdb.len())
            .field("fallback_family", &self.fallback_family)
            .finish()
    }
}

impl Rasterizer {
    pub fn new(fontdb: Arc<fontdb::Database>, fallback_family: impl Into<String>) -> Self {
        Self {
            fontdb,
            fallback_family: fallback_family.into(),
            encoded: Mutex::new(HashMap::new()),
        }
    }

    fn options(&self) -> Options<'static> {
        let mut options = Options::default();
        options.fontdb = Arc::clone(&self.fontdb);
        options.font_family = self.fallback_family.clone();
        options
    }

    /// Draws every object of `target` over its backdrop, bottom first.
    ///
    /// Objects that fail to render are skipped with a warning.
    pub fn rasterize(&self, target: &RenderTarget) -> RgbaImage {
        let size = target.size();
        let [r, g, b] = target.backdrop;
        let mut canvas = RgbaImage::from_pixel(size.width, size.height, Rgba([r, g, b, 255]));
        let options = self.options();
        let resolve = |image: &ImageContent| self.image_href(image);
        let layout = TextLayout::new(&self.fontdb, &self.fallback_family);

        for object in target.objects() {
            let Some(document) = markup::document(object, size, &layout, &resolve) else {
                continue;
            };
            match svg::render_document(&document, size, &options) {
                Ok(layer) => svg::composite_over(&mut canvas, &layer, 0, 0),
                Err(err) => warn!(kind = object.type_tag(), "Skipping object: {}", err),
            }
        }

        canvas
    }

    fn image_href(&self, image: &ImageContent) -> Option<String> {
        let Some(payload) = image.payload.as_ref() else {
            warn!(src = %image.src, "Image has no resolved payload");
            return None;
        };
        if payload.is_svg() {
            return Some(data_uri(&payload.content_type, &payload.bytes));
        }

        let key = CacheKey::new(image);
        if let Ok(cache) = self.encoded.lock() {
            if let Some(hit) = cache.get(&key) {
                return Some(hit.to_string());
            }
        }

        let mut pixels = match image::load_from_memory(&payload.bytes) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(err) => {
                warn!(src = %image.src, "Cannot decode image: {}", err);
                return None;
            }
        };
        for filter in &image.filters {
            apply_filter(&mut pixels, filter);
        }
        let png = match encode_png(&pixels) {
            Ok(png) => png,
            Err(err) => {
                warn!(src = %image.src, "Cannot encode image: {}", err);
                return None;
            }
        };

        let uri: Arc<str> = Arc::from(data_uri("image/png", &png));
        if let Ok(mut cache) = self.encoded.lock() {
            cache.insert(key, Arc::clone(&uri));
        }
        Some(uri.to_string())
    }
}

/// Encodes an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}
