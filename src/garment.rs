//! Garment background resolution.
//!
//! The same rule decides the background for the live surface and for export:
//! white and black are sentinels selecting a dedicated asset with no filter,
//! every other color tints the white asset with a multiply blend.

use image::RgbaImage;
use palette::Srgb;
use tracing::debug;

use crate::color::GarmentColor;
use crate::config::GarmentConfig;
use crate::error::CodecError;
use crate::fetch::AssetFetcher;
use crate::scene::record::load_payload;
use crate::scene::{
    BlendMode, GARMENT_BACKGROUND, Geometry, ImageContent, ImageFilter, ObjectKind, SceneObject,
};
use crate::view::View;

// ============================================================================
// GarmentBackground
// ============================================================================

/// The resolved background for one (view, color) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GarmentBackground {
    pub view: View,
    /// Asset source to fetch.
    pub asset: String,
    /// Width the image is scaled to; height follows the aspect ratio.
    pub scaled_width: u32,
    /// Center of the image on the surface.
    pub anchor: (f64, f64),
    /// Multiply tint, `None` for the white and black sentinels.
    pub tint: Option<GarmentColor>,
}

impl GarmentBackground {
    /// Filters to attach to the background image.
    pub fn filters(&self) -> Vec<ImageFilter> {
        self.tint
            .map(|color| ImageFilter::BlendColor {
                color,
                mode: BlendMode::Multiply,
                alpha: 1.0,
            })
            .into_iter()
            .collect()
    }
}

// ============================================================================
// GarmentRenderer
// ============================================================================

/// Resolves and places garment backgrounds.
#[derive(Debug, Clone, Default)]
pub struct GarmentRenderer {
    config: GarmentConfig,
}

impl GarmentRenderer {
    pub fn new(config: GarmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GarmentConfig {
        &self.config
    }

    /// Applies the background rule. Pure in `(view, color)`.
    ///
    /// # Example
    ///
    /// ```
    /// use garment_mockup::{GarmentColor, GarmentRenderer, View};
    ///
    /// let renderer = GarmentRenderer::default();
    /// let bg = renderer.resolve(View::Back, GarmentColor::BLACK);
    /// assert_eq!(bg.asset, "/black-tshirt-back.png");
    /// assert!(bg.tint.is_none());
    /// ```
    pub fn resolve(&self, view: View, color: GarmentColor) -> GarmentBackground {
        let (asset, tint) = if color.is_black() {
            (self.config.black_asset(view), None)
        } else if color.is_white() {
            (self.config.white_asset(view), None)
        } else {
            (self.config.white_asset(view), Some(color))
        };

        GarmentBackground {
            view,
            asset,
            scaled_width: self.config.scaled_width(view),
            anchor: (self.config.anchor_x, self.config.anchor_y),
            tint,
        }
    }

    /// Fetches the resolved asset and builds the background object.
    pub async fn background_object(
        &self,
        background: &GarmentBackground,
        fetcher: &dyn AssetFetcher,
    ) -> Result<SceneObject, CodecError> {
        let payload = load_payload(&background.asset, fetcher).await?;
        debug!(
            view = %background.view,
            asset = %background.asset,
            tinted = background.tint.is_some(),
            "Loaded garment background"
        );

        let (x, y) = background.anchor;
        let mut geometry = Geometry::centered(
            x,
            y,
            f64::from(payload.size.width),
            f64::from(payload.size.height),
        );
        geometry.scale_to_width(f64::from(background.scaled_width));

        let object = SceneObject::new(
            ObjectKind::Image(ImageContent {
                src: background.asset.clone(),
                payload: Some(payload),
                filters: background.filters(),
            }),
            geometry,
        );
        Ok(object.with_name(GARMENT_BACKGROUND))
    }
}

// ============================================================================
// Pixel filters
// ============================================================================

/// Multiplies every visible pixel by `color`, mixed in by `alpha`.
pub fn apply_tint(image: &mut RgbaImage, color: GarmentColor, alpha: f64) {
    let (tr, tg, tb) = color.rgb();
    let tint: Srgb<f32> = Srgb::new(tr, tg, tb).into_format();
    let alpha = alpha.clamp(0.0, 1.0) as f32;

    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }

        let src: Srgb<f32> = Srgb::new(r, g, b).into_format();
        let mix = |s: f32, t: f32| s + (s * t - s) * alpha;
        let out: Srgb<u8> = Srgb::new(
            mix(src.red, tint.red),
            mix(src.green, tint.green),
            mix(src.blue, tint.blue),
        )
        .into_format();

        pixel.0 = [out.red, out.green, out.blue, a];
    }
}

/// Applies one image filter in place.
pub fn apply_filter(image: &mut RgbaImage, filter: &ImageFilter) {
    match filter {
        ImageFilter::BlendColor {
            color,
            mode: BlendMode::Multiply,
            alpha,
        } => apply_tint(image, *color, *alpha),
    }
}
