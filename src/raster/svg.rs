//! SVG rendering utilities using resvg/usvg.
//!
//! Every object is drawn by generating a full-surface SVG document for it and
//! rendering that document into its own layer, which is then composited over
//! the target.

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

use crate::geometry::SizePx;

// ============================================================================
// SVG Rendering
// ============================================================================

/// Renders an SVG document into an RGBA image of exactly `size`.
///
/// The document is drawn at 1:1; content outside `size` is clipped.
pub fn render_document(svg_data: &str, size: SizePx, options: &Options) -> Result<RgbaImage, String> {
    let tree = Tree::from_str(svg_data, options).map_err(|err| err.to_string())?;

    let mut pixmap = Pixmap::new(size.width, size.height)
        .ok_or_else(|| format!("cannot allocate {}x{} pixmap", size.width, size.height))?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

    Ok(pixmap_to_rgba_image(&pixmap))
}

/// Returns the natural size of SVG markup, rounded up to whole pixels.
pub fn intrinsic_size(svg_data: &[u8]) -> Result<SizePx, String> {
    let tree = Tree::from_data(svg_data, &Options::default()).map_err(|err| err.to_string())?;
    let size = tree.size();
    Ok(SizePx::new(
        (size.width().ceil() as u32).max(1),
        (size.height().ceil() as u32).max(1),
    ))
}

/// Converts a tiny_skia Pixmap to an image::RgbaImage.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());

    // tiny_skia uses premultiplied alpha
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }

    img
}

// ============================================================================
// Compositing
// ============================================================================

/// Composites a source image onto a destination image at the specified position.
///
/// Uses standard alpha blending (source over destination).
pub fn composite_over(dest: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    let dest_width = dest.width() as i32;
    let dest_height = dest.height() as i32;

    for (sx, sy, src_pixel) in src.enumerate_pixels() {
        if src_pixel[3] == 0 {
            continue;
        }

        let dx = x + sx as i32;
        let dy = y + sy as i32;
        if dx < 0 || dy < 0 || dx >= dest_width || dy >= dest_height {
            continue;
        }

        let dst_pixel = dest.get_pixel(dx as u32, dy as u32);
        let blended = alpha_blend(*src_pixel, *dst_pixel);
        dest.put_pixel(dx as u32, dy as u32, blended);
    }
}

/// Alpha blends two RGBA pixels (source over destination).
fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}

// ============================================================================
// Tests
// ============================================================================
