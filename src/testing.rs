//! Shared test fixtures.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::config::DesignerConfig;
use crate::fetch::{FetchedAsset, MemoryFetcher};
use crate::geometry::RectPx;
use crate::view::View;

/// Encodes a solid-color PNG.
pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub(crate) fn png_asset(width: u32, height: u32, rgba: [u8; 4]) -> FetchedAsset {
    FetchedAsset::new(png_bytes(width, height, rgba), Some("image/png".to_string()))
}

/// A fetcher serving every garment asset of `config`.
///
/// White garments are light gray, black garments near-black, so tints and
/// sentinels can be told apart in rendered pixels.
pub(crate) fn garment_fetcher_for(config: &DesignerConfig) -> MemoryFetcher {
    let mut fetcher = MemoryFetcher::new();
    for view in View::ALL {
        fetcher.insert(
            config.garment.white_asset(view),
            png_asset(40, 50, [240, 240, 240, 255]),
        );
        fetcher.insert(
            config.garment.black_asset(view),
            png_asset(40, 50, [20, 20, 20, 255]),
        );
    }
    fetcher
}

pub(crate) fn garment_fetcher() -> MemoryFetcher {
    garment_fetcher_for(&DesignerConfig::default())
}

/// The stock layout shrunk tenfold, so renders stay cheap.
pub(crate) fn small_config() -> DesignerConfig {
    let mut config = DesignerConfig::default();
    config.canvas.width = 70;
    config.canvas.height = 85;
    config.printable_area = RectPx::centered(35.0, 45.0, 28.0, 42.0);
    config.garment.anchor_x = 35.0;
    config.garment.anchor_y = 42.5;
    config.garment.front_width = 80;
    config.garment.side_width = 70;
    config.placement.center_x = 35.0;
    config.placement.center_y = 45.0;
    config.placement.image_width = 20.0;
    config.placement.icon_width = 10.0;
    config.placement.text_width = 20.0;
    config.placement.font_size = 4.0;
    config.fonts.load_timeout_ms = 50;
    config.fonts.system_fonts = false;
    config
}

pub(crate) const SQUARE_ICON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24"><path d="M4 4H20V20H4Z" fill="#336699"/></svg>"##;
