//! Scene objects placed on a garment view.
//!
//! A [`SceneObject`] is the live form of a placed element. Its kind is a
//! closed set of variants ([`ObjectKind`]); paint changes that must reach
//! every part of an icon go through the recursive [`SceneObject::apply_fill`]
//! and [`SceneObject::apply_stroke`] instead of inspecting types at runtime.
//!
//! The portable form lives in [`record`]; icon markup import in [`icon`].

pub mod icon;
pub mod record;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::color::GarmentColor;
use crate::geometry::SizePx;

/// Name carried by the garment image placed under every view.
pub const GARMENT_BACKGROUND: &str = "tshirt-background";

/// Name carried by the dashed printable-area guide.
pub const PRINTABLE_AREA: &str = "printable-area";

/// Returns true if `name` marks a structural (re-derived, never persisted) object.
pub fn is_structural_name(name: Option<&str>) -> bool {
    matches!(name, Some(GARMENT_BACKGROUND | PRINTABLE_AREA))
}

// ============================================================================
// ObjectId
// ============================================================================

/// Stable identity of a scene object, preserved through records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an id previously produced by [`ObjectId::to_string`].
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Horizontal anchor of `left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum OriginX {
    #[default]
    Left,
    Center,
    Right,
}

impl OriginX {
    /// Fraction of the object's width between its left edge and the anchor.
    pub fn factor(&self) -> f64 {
        match self {
            Self::Left => 0.0,
            Self::Center => 0.5,
            Self::Right => 1.0,
        }
    }
}

/// Vertical anchor of `top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum OriginY {
    #[default]
    Top,
    Center,
    Bottom,
}

impl OriginY {
    /// Fraction of the object's height between its top edge and the anchor.
    pub fn factor(&self) -> f64 {
        match self {
            Self::Top => 0.0,
            Self::Center => 0.5,
            Self::Bottom => 1.0,
        }
    }
}

/// Placement of an object on the surface.
///
/// `left`/`top` locate the anchor point selected by the origins. `width` and
/// `height` are the intrinsic (unscaled) size; rotation is in degrees around
/// the anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
    pub origin_x: OriginX,
    pub origin_y: OriginY,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            origin_x: OriginX::Left,
            origin_y: OriginY::Top,
        }
    }
}

impl Geometry {
    /// Creates a geometry of the given intrinsic size anchored at its center.
    pub fn centered(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            left: x,
            top: y,
            width,
            height,
            origin_x: OriginX::Center,
            origin_y: OriginY::Center,
            ..Self::default()
        }
    }

    pub fn scaled_width(&self) -> f64 {
        self.width * self.scale_x
    }

    pub fn scaled_height(&self) -> f64 {
        self.height * self.scale_y
    }

    /// Scales uniformly so the scaled width equals `target`.
    pub fn scale_to_width(&mut self, target: f64) {
        if self.width > 0.0 {
            let scale = target / self.width;
            self.scale_x = scale;
            self.scale_y = scale;
        }
    }
}

// ============================================================================
// Paint
// ============================================================================

/// Rounded-rectangle clip, positioned relative to the object's center.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipShape {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub rx: f64,
    pub ry: f64,
}

impl ClipShape {
    /// A clip covering an object of the given intrinsic size with rounded corners.
    pub fn rounded(width: f64, height: f64, radius: f64) -> Self {
        Self {
            left: -width / 2.0,
            top: -height / 2.0,
            width,
            height,
            rx: radius,
            ry: radius,
        }
    }
}

/// Drop shadow drawn under an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Shadow {
    pub color: String,
    pub blur: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Paint attributes shared by every object kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: f64,
    /// Keep the stroke width constant under scaling.
    pub stroke_uniform: bool,
    pub clip: Option<ClipShape>,
    pub shadow: Option<Shadow>,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            stroke_uniform: false,
            clip: None,
            shadow: None,
        }
    }
}

// ============================================================================
// Object kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
    Justify,
}

/// Editable text box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextContent {
    pub text: String,
    pub font_family: String,
    pub font_size: f64,
    pub text_align: TextAlign,
}

impl TextContent {
    /// Line height as a multiple of the font size.
    pub const LINE_HEIGHT: f64 = 1.16;

    /// Height of a block of `lines` laid-out lines; never less than one line.
    pub fn block_height(&self, lines: usize) -> f64 {
        self.font_size * Self::LINE_HEIGHT * lines.max(1) as f64
    }
}

/// Blend mode of a color filter. Only multiply is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Multiply,
}

/// Pixel filter applied to an image before it is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(tag = "type")]
pub enum ImageFilter {
    /// Blends a flat color into every pixel.
    #[serde(rename_all = "camelCase")]
    BlendColor {
        #[cfg_attr(feature = "jsonschema", schemars(with = "String"))]
        color: GarmentColor,
        #[serde(default)]
        mode: BlendMode,
        #[serde(default = "full_alpha")]
        alpha: f64,
    },
}

fn full_alpha() -> f64 {
    1.0
}

/// Resolved bytes behind an image source.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Arc<[u8]>,
    pub content_type: String,
    /// Natural size in pixels.
    pub size: SizePx,
}

impl ImagePayload {
    pub fn is_svg(&self) -> bool {
        self.content_type.starts_with("image/svg")
    }
}

/// Raster (or SVG) image referenced by an external source.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageContent {
    /// Data URI, URL or asset path.
    pub src: String,
    /// Filled in once the source has been fetched and decoded.
    pub payload: Option<ImagePayload>,
    pub filters: Vec<ImageFilter>,
}

impl ImageContent {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            payload: None,
            filters: Vec::new(),
        }
    }
}

/// Grouped vector parts of an icon.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupContent {
    pub objects: Vec<SceneObject>,
    /// Markup the group was imported from.
    pub source: Option<String>,
}

/// Simple vector shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Rectangle filling the object's width and height.
    Rect { rx: f64, ry: f64 },
    Circle { radius: f64 },
    /// SVG path data in the object's local coordinates.
    Path { data: String },
}

/// The closed set of object variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Text(TextContent),
    Image(ImageContent),
    Group(GroupContent),
    Shape(ShapeKind),
}

// ============================================================================
// SceneObject
// ============================================================================

/// A single placed element.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: ObjectId,
    /// Distinguishes structural objects from user content.
    pub name: Option<String>,
    pub geometry: Geometry,
    pub paint: Paint,
    pub kind: ObjectKind,
    /// Record fields this version does not interpret, carried through untouched.
    pub extra: Map<String, Value>,
}

impl SceneObject {
    pub fn new(kind: ObjectKind, geometry: Geometry) -> Self {
        Self {
            id: ObjectId::new(),
            name: None,
            geometry,
            paint: Paint::default(),
            kind,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.paint.fill = Some(fill.into());
        self
    }

    /// Returns true for the garment background and printable-area guide.
    pub fn is_structural(&self) -> bool {
        is_structural_name(self.name.as_deref())
    }

    /// The record type tag for this object.
    pub fn type_tag(&self) -> &'static str {
        match &self.kind {
            ObjectKind::Text(_) => "textbox",
            ObjectKind::Image(_) => "image",
            ObjectKind::Group(_) => "group",
            ObjectKind::Shape(ShapeKind::Rect { .. }) => "rect",
            ObjectKind::Shape(ShapeKind::Circle { .. }) => "circle",
            ObjectKind::Shape(ShapeKind::Path { .. }) => "path",
        }
    }

    /// The external image source, if this is an image.
    pub fn image_source(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Image(image) => Some(image.src.as_str()),
            _ => None,
        }
    }

    /// Sets the fill on this object and, for groups, on every descendant.
    pub fn apply_fill(&mut self, color: &str) {
        self.paint.fill = Some(color.to_string());
        if let ObjectKind::Group(group) = &mut self.kind {
            for child in &mut group.objects {
                child.apply_fill(color);
            }
        }
    }

    /// Sets the stroke on this object and, for groups, on every descendant.
    ///
    /// Strokes set this way keep their width under scaling.
    pub fn apply_stroke(&mut self, color: &str, width: f64) {
        self.paint.stroke = Some(color.to_string());
        self.paint.stroke_width = width;
        self.paint.stroke_uniform = true;
        if let ObjectKind::Group(group) = &mut self.kind {
            for child in &mut group.objects {
                child.apply_stroke(color, width);
            }
        }
    }
}
