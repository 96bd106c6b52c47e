//! Session configuration.
//!
//! Every value has a default matching the stock 700x850 editor, so an empty
//! JSON object is a valid configuration:
//!
//! ```
//! use garment_mockup::DesignerConfig;
//!
//! let config = DesignerConfig::from_json("{}").unwrap();
//! assert_eq!(config.canvas.width, 700);
//! assert_eq!(config.archive_name, "tshirt_design.zip");
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DesignError;
use crate::geometry::RectPx;
use crate::view::View;

/// Top-level configuration for a design session and its exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignerConfig {
    pub canvas: CanvasConfig,

    /// The dashed guide marking where print is possible.
    pub printable_area: RectPx,

    pub garment: GarmentConfig,

    pub placement: PlacementConfig,

    pub fonts: FontConfig,

    /// Maximum number of history snapshots kept. `None` keeps everything.
    pub history_limit: Option<usize>,

    /// File name offered for the exported archive.
    pub archive_name: String,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            printable_area: RectPx::centered(350.0, 450.0, 280.0, 420.0),
            garment: GarmentConfig::default(),
            placement: PlacementConfig::default(),
            fonts: FontConfig::default(),
            history_limit: None,
            archive_name: "tshirt_design.zip".to_string(),
        }
    }
}

impl DesignerConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, DesignError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DesignError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Dimensions and backdrop of the working surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Backdrop painted under the garment, `[r, g, b]`.
    pub background: [u8; 3],
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 700,
            height: 850,
            background: [255, 255, 255],
        }
    }
}

/// Garment asset table and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GarmentConfig {
    /// Center of the garment image on the surface.
    pub anchor_x: f64,
    pub anchor_y: f64,

    /// Width the front image is scaled to. The front asset carries more
    /// padding than the generated side/back assets.
    pub front_width: u32,

    /// Width the back, left and right images are scaled to.
    pub side_width: u32,

    /// White (tintable) front asset.
    pub front_white: String,

    /// Pre-rendered black front asset.
    pub front_black: String,

    /// White asset template for back/left/right, `{view}` is substituted.
    pub view_white: String,

    /// Black asset template for back/left/right, `{view}` is substituted.
    pub view_black: String,
}

impl Default for GarmentConfig {
    fn default() -> Self {
        Self {
            anchor_x: 350.0,
            anchor_y: 425.0,
            front_width: 800,
            side_width: 700,
            front_white: "/tshirt-realistic.png".to_string(),
            front_black: "/black-tshirt.png".to_string(),
            view_white: "/tshirt-{view}.png".to_string(),
            view_black: "/black-tshirt-{view}.png".to_string(),
        }
    }
}

impl GarmentConfig {
    /// Returns the white-base asset path for a view.
    pub fn white_asset(&self, view: View) -> String {
        match view {
            View::Front => self.front_white.clone(),
            _ => self.view_white.replace("{view}", view.as_str()),
        }
    }

    /// Returns the pre-rendered black asset path for a view.
    pub fn black_asset(&self, view: View) -> String {
        match view {
            View::Front => self.front_black.clone(),
            _ => self.view_black.replace("{view}", view.as_str()),
        }
    }

    pub fn scaled_width(&self, view: View) -> u32 {
        match view {
            View::Front => self.front_width,
            _ => self.side_width,
        }
    }
}

/// Where and how large newly added elements appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementConfig {
    pub center_x: f64,
    pub center_y: f64,
    pub image_width: f64,
    pub icon_width: f64,
    pub text_width: f64,
    pub font_size: f64,
    pub placeholder_text: String,
    pub default_fill: String,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            center_x: 350.0,
            center_y: 450.0,
            image_width: 200.0,
            icon_width: 100.0,
            text_width: 200.0,
            font_size: 40.0,
            placeholder_text: "Double click to edit".to_string(),
            default_fill: "#000000".to_string(),
        }
    }
}

/// Font loading policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontConfig {
    /// Family used when a requested font cannot be loaded in time.
    pub fallback_family: String,

    /// Source template for font files, `{family}` is substituted.
    pub source_template: String,

    /// Upper bound on waiting for a font, in milliseconds.
    pub load_timeout_ms: u64,

    /// Whether installed system fonts are available to text rendering.
    pub system_fonts: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            fallback_family: "sans-serif".to_string(),
            source_template: "/fonts/{family}.ttf".to_string(),
            load_timeout_ms: 5000,
            system_fonts: true,
        }
    }
}

impl FontConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn source_for(&self, family: &str) -> String {
        self.source_template.replace("{family}", family)
    }
}
