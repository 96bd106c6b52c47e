//! Portable scene records.
//!
//! A [`SceneRecord`] is the JSON-safe form of a [`SceneObject`]: a flat
//! attribute bag with a `type` tag. Records are what views persist, what
//! history snapshots hold and what exports rehydrate. Fields this version does
//! not interpret are collected into `extra` and written back unchanged.
//!
//! ```
//! use garment_mockup::scene::record::SceneRecord;
//!
//! let record: SceneRecord = serde_json::from_str(
//!     r#"{"type":"rect","left":10,"top":20,"width":30,"height":40,"lockMovementX":true}"#,
//! )
//! .unwrap();
//! assert_eq!(record.scale_x, 1.0);
//! assert!(record.extra.contains_key("lockMovementX"));
//! ```

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::CodecError;
use crate::fetch::{AssetFetcher, sniff_content_type};
use crate::geometry::SizePx;
use crate::scene::{
    ClipShape, Geometry, GroupContent, ImageContent, ImageFilter, ImagePayload, ObjectId,
    ObjectKind, OriginX, OriginY, Paint, SceneObject, Shadow, ShapeKind, TextAlign, TextContent,
};

// ============================================================================
// Record types
// ============================================================================

/// Flat, serializable form of a scene object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    /// Object type tag (`textbox`, `image`, `group`, `rect`, `circle`, `path`).
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    #[serde(default)]
    pub origin_x: OriginX,
    #[serde(default)]
    pub origin_y: OriginY,

    #[serde(default = "unit_scale")]
    pub scale_x: f64,
    #[serde(default = "unit_scale")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default = "unit_scale")]
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stroke_uniform: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<ClipRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ImageFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<SceneRecord>>,
    /// Markup an icon group was imported from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ry: Option<f64>,

    /// Unrecognised fields, preserved verbatim.
    #[serde(flatten)]
    #[cfg_attr(feature = "jsonschema", schemars(skip))]
    pub extra: Map<String, Value>,
}

fn unit_scale() -> f64 {
    1.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Rounded-rect clip. Positions are relative to the owning object's center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    #[serde(rename = "type", default = "rect_tag")]
    pub kind: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub rx: f64,
    #[serde(default)]
    pub ry: f64,
}

fn rect_tag() -> String {
    "rect".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ShadowRecord {
    pub color: String,
    #[serde(default)]
    pub blur: f64,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
}

impl From<&ClipShape> for ClipRecord {
    fn from(clip: &ClipShape) -> Self {
        Self {
            kind: rect_tag(),
            left: clip.left,
            top: clip.top,
            width: clip.width,
            height: clip.height,
            rx: clip.rx,
            ry: clip.ry,
        }
    }
}

impl From<&ClipRecord> for ClipShape {
    fn from(clip: &ClipRecord) -> Self {
        Self {
            left: clip.left,
            top: clip.top,
            width: clip.width,
            height: clip.height,
            rx: clip.rx,
            ry: clip.ry,
        }
    }
}

impl From<&Shadow> for ShadowRecord {
    fn from(shadow: &Shadow) -> Self {
        Self {
            color: shadow.color.clone(),
            blur: shadow.blur,
            offset_x: shadow.offset_x,
            offset_y: shadow.offset_y,
        }
    }
}

impl From<&ShadowRecord> for Shadow {
    fn from(shadow: &ShadowRecord) -> Self {
        Self {
            color: shadow.color.clone(),
            blur: shadow.blur,
            offset_x: shadow.offset_x,
            offset_y: shadow.offset_y,
        }
    }
}

impl SceneRecord {
    fn empty(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: None,
            id: None,
            left: 0.0,
            top: 0.0,
            width: None,
            height: None,
            origin_x: OriginX::default(),
            origin_y: OriginY::default(),
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            stroke_uniform: false,
            clip_path: None,
            shadow: None,
            src: None,
            filters: Vec::new(),
            text: None,
            font_family: None,
            font_size: None,
            text_align: None,
            objects: None,
            source: None,
            path: None,
            radius: None,
            rx: None,
            ry: None,
            extra: Map::new(),
        }
    }

    /// Returns true if the record names a structural object.
    pub fn is_structural(&self) -> bool {
        crate::scene::is_structural_name(self.name.as_deref())
    }

    /// External image sources referenced by this record and its children.
    pub fn image_sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sources(&mut out);
        out
    }

    fn collect_sources<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.kind == "image" {
            if let Some(src) = self.src.as_deref() {
                out.push(src);
            }
        }
        for child in self.objects.iter().flatten() {
            child.collect_sources(out);
        }
    }
}

// ============================================================================
// Serialize
// ============================================================================

/// Captures an object's attributes into a record.
pub fn serialize(object: &SceneObject) -> SceneRecord {
    let mut record = SceneRecord::empty(object.type_tag());
    record.name = object.name.clone();
    record.id = Some(object.id.to_string());

    let g = &object.geometry;
    record.left = g.left;
    record.top = g.top;
    record.width = Some(g.width);
    record.height = Some(g.height);
    record.origin_x = g.origin_x;
    record.origin_y = g.origin_y;
    record.scale_x = g.scale_x;
    record.scale_y = g.scale_y;
    record.angle = g.angle;

    let p = &object.paint;
    record.fill = p.fill.clone();
    record.stroke = p.stroke.clone();
    record.stroke_width = p.stroke_width;
    record.stroke_uniform = p.stroke_uniform;
    record.clip_path = p.clip.as_ref().map(ClipRecord::from);
    record.shadow = p.shadow.as_ref().map(ShadowRecord::from);

    match &object.kind {
        ObjectKind::Text(text) => {
            record.text = Some(text.text.clone());
            record.font_family = Some(text.font_family.clone());
            record.font_size = Some(text.font_size);
            record.text_align = Some(text.text_align);
        }
        ObjectKind::Image(image) => {
            record.src = Some(image.src.clone());
            record.filters = image.filters.clone();
        }
        ObjectKind::Group(group) => {
            record.objects = Some(group.objects.iter().map(serialize).collect());
            record.source = group.source.clone();
        }
        ObjectKind::Shape(ShapeKind::Rect { rx, ry }) => {
            record.rx = Some(*rx);
            record.ry = Some(*ry);
        }
        ObjectKind::Shape(ShapeKind::Circle { radius }) => {
            record.radius = Some(*radius);
        }
        ObjectKind::Shape(ShapeKind::Path { data }) => {
            record.path = Some(data.clone());
        }
    }

    record.extra = object.extra.clone();
    record
}

/// Serializes an ordered list, skipping structural objects.
pub fn serialize_objects<'a>(objects: impl IntoIterator<Item = &'a SceneObject>) -> Vec<SceneRecord> {
    objects
        .into_iter()
        .filter(|object| !object.is_structural())
        .map(serialize)
        .collect()
}

// ============================================================================
// Deserialize
// ============================================================================

/// Rebuilds objects from records, resolving image sources through `fetcher`.
///
/// Output order equals input order. Records that cannot be rebuilt are
/// dropped with a warning; the batch never fails as a whole.
pub async fn deserialize(records: &[SceneRecord], fetcher: &dyn AssetFetcher) -> Vec<SceneObject> {
    if records.is_empty() {
        return Vec::new();
    }

    let results = join_all(records.iter().map(|record| rehydrate(record, fetcher))).await;

    let mut objects = Vec::with_capacity(records.len());
    for (record, result) in records.iter().zip(results) {
        match result {
            Ok(object) => objects.push(object),
            Err(err) => warn!(kind = %record.kind, "Dropping record: {}", err),
        }
    }
    debug!("Rehydrated {} of {} records", objects.len(), records.len());
    objects
}

/// Rebuilds one record and resolves its image payloads.
pub async fn rehydrate(record: &SceneRecord, fetcher: &dyn AssetFetcher) -> Result<SceneObject, CodecError> {
    let mut object = SceneObject::try_from(record)?;
    resolve_payloads(&mut object, fetcher).await?;
    Ok(object)
}

fn resolve_payloads<'a>(
    object: &'a mut SceneObject,
    fetcher: &'a dyn AssetFetcher,
) -> BoxFuture<'a, Result<(), CodecError>> {
    async move {
        match &mut object.kind {
            ObjectKind::Image(image) if image.payload.is_none() => {
                image.payload = Some(load_payload(&image.src, fetcher).await?);
            }
            ObjectKind::Group(group) => {
                for child in &mut group.objects {
                    resolve_payloads(child, fetcher).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }
    .boxed()
}

/// Fetches and decodes an image source far enough to know its natural size.
pub async fn load_payload(src: &str, fetcher: &dyn AssetFetcher) -> Result<ImagePayload, CodecError> {
    let asset = fetcher.fetch(src).await?;
    let content_type = asset
        .content_type
        .clone()
        .filter(|ct| ct.starts_with("image/"))
        .or_else(|| sniff_content_type(&asset.bytes))
        .ok_or_else(|| CodecError::Decode {
            src: truncate(src),
            reason: "unrecognised content".to_string(),
        })?;

    let size = if content_type.starts_with("image/svg") {
        crate::raster::svg::intrinsic_size(&asset.bytes)
    } else {
        image::load_from_memory(&asset.bytes)
            .map(|img| {
                let rgba = img.to_rgba8();
                SizePx::new(rgba.width(), rgba.height())
            })
            .map_err(|err| err.to_string())
    }
    .map_err(|reason| CodecError::Decode {
        src: truncate(src),
        reason,
    })?;

    Ok(ImagePayload {
        bytes: asset.bytes,
        content_type,
        size,
    })
}

fn truncate(src: &str) -> String {
    if src.len() > 64 {
        format!("{}…", src.chars().take(64).collect::<String>())
    } else {
        src.to_string()
    }
}

impl TryFrom<&SceneRecord> for SceneObject {
    type Error = CodecError;

    /// Rebuilds the structure of a record without touching the network.
    fn try_from(record: &SceneRecord) -> Result<Self, Self::Error> {
        let kind = match record.kind.as_str() {
            "textbox" | "i-text" | "text" => ObjectKind::Text(TextContent {
                text: record.text.clone().ok_or(CodecError::MissingField {
                    kind: "textbox",
                    field: "text",
                })?,
                font_family: record
                    .font_family
                    .clone()
                    .unwrap_or_else(|| "sans-serif".to_string()),
                font_size: record.font_size.unwrap_or(40.0),
                text_align: record.text_align.unwrap_or_default(),
            }),
            "image" => ObjectKind::Image(ImageContent {
                src: record.src.clone().ok_or(CodecError::MissingField {
                    kind: "image",
                    field: "src",
                })?,
                payload: None,
                filters: record.filters.clone(),
            }),
            "group" => {
                let children = record.objects.as_ref().ok_or(CodecError::MissingField {
                    kind: "group",
                    field: "objects",
                })?;
                let mut objects = Vec::with_capacity(children.len());
                for child in children {
                    match SceneObject::try_from(child) {
                        Ok(object) => objects.push(object),
                        Err(err) => warn!("Dropping group member: {}", err),
                    }
                }
                ObjectKind::Group(GroupContent {
                    objects,
                    source: record.source.clone(),
                })
            }
            "rect" => ObjectKind::Shape(ShapeKind::Rect {
                rx: record.rx.unwrap_or(0.0),
                ry: record.ry.unwrap_or(0.0),
            }),
            "circle" => ObjectKind::Shape(ShapeKind::Circle {
                radius: record.radius.ok_or(CodecError::MissingField {
                    kind: "circle",
                    field: "radius",
                })?,
            }),
            "path" => ObjectKind::Shape(ShapeKind::Path {
                data: record.path.clone().ok_or(CodecError::MissingField {
                    kind: "path",
                    field: "path",
                })?,
            }),
            other => return Err(CodecError::UnknownType(other.to_string())),
        };

        let (default_width, default_height) = match &kind {
            ObjectKind::Shape(ShapeKind::Circle { radius }) => (radius * 2.0, radius * 2.0),
            _ => (0.0, 0.0),
        };

        let geometry = Geometry {
            left: record.left,
            top: record.top,
            width: record.width.unwrap_or(default_width),
            height: record.height.unwrap_or(default_height),
            scale_x: record.scale_x,
            scale_y: record.scale_y,
            angle: record.angle,
            origin_x: record.origin_x,
            origin_y: record.origin_y,
        };

        let paint = Paint {
            fill: record.fill.clone(),
            stroke: record.stroke.clone(),
            stroke_width: record.stroke_width,
            stroke_uniform: record.stroke_uniform,
            clip: record.clip_path.as_ref().map(ClipShape::from),
            shadow: record.shadow.as_ref().map(Shadow::from),
        };

        Ok(SceneObject {
            id: record
                .id
                .as_deref()
                .and_then(ObjectId::parse)
                .unwrap_or_default(),
            name: record.name.clone(),
            geometry,
            paint,
            kind,
            extra: record.extra.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchedAsset, MemoryFetcher};
    use crate::scene::{GARMENT_BACKGROUND, PRINTABLE_AREA};
    use crate::testing;

    fn text_object() -> SceneObject {
        let mut object = SceneObject::new(
            ObjectKind::Text(TextContent {
                text: "Hello".to_string(),
                font_family: "Lobster".to_string(),
                font_size: 40.0,
                text_align: TextAlign::Center,
            }),
            Geometry::centered(350.0, 450.0, 200.0, 46.4),
        )
        .with_fill("#000000");
        object.paint.clip = Some(ClipShape::rounded(200.0, 46.4, 8.0));
        object.paint.shadow = Some(Shadow {
            color: "#333333".to_string(),
            blur: 4.0,
            offset_x: 0.0,
            offset_y: 0.0,
        });
        object
    }

    #[test]
    fn record_json_shape() {
        let record = serialize(&text_object());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "textbox");
        assert_eq!(json["originX"], "center");
        assert_eq!(json["scaleX"], 1.0);
        assert_eq!(json["fontFamily"], "Lobster");
        assert_eq!(json["clipPath"]["type"], "rect");
        assert_eq!(json["clipPath"]["left"], -100.0);
        assert_eq!(json["shadow"]["blur"], 4.0);
        assert!(json.get("src").is_none());
        assert!(json.get("filters").is_none());
    }

    #[test]
    fn structural_objects_are_skipped() {
        let guide = SceneObject::new(
            ObjectKind::Shape(ShapeKind::Rect { rx: 0.0, ry: 0.0 }),
            Geometry::default(),
        )
        .with_name(PRINTABLE_AREA);
        let garment = SceneObject::new(ObjectKind::Image(ImageContent::new("/x.png")), Geometry::default())
            .with_name(GARMENT_BACKGROUND);
        let user = text_object();

        let records = serialize_objects([&garment, &guide, &user]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "textbox");
    }

    #[test]
    fn unknown_fields_survive() {
        let json = r#"{"type":"path","path":"M0 0L10 10","selectable":false,"data":{"k":1}}"#;
        let record: SceneRecord = serde_json::from_str(json).unwrap();
        let object = SceneObject::try_from(&record).unwrap();
        let back = serde_json::to_value(serialize(&object)).unwrap();

        assert_eq!(back["selectable"], false);
        assert_eq!(back["data"]["k"], 1);
    }

    #[test]
    fn missing_required_fields() {
        let record: SceneRecord = serde_json::from_str(r#"{"type":"image"}"#).unwrap();
        assert!(matches!(
            SceneObject::try_from(&record),
            Err(CodecError::MissingField { field: "src", .. })
        ));

        let record: SceneRecord = serde_json::from_str(r#"{"type":"polyline"}"#).unwrap();
        assert!(matches!(
            SceneObject::try_from(&record),
            Err(CodecError::UnknownType(_))
        ));
    }

    #[test]
    fn collects_nested_image_sources() {
        let json = r#"{"type":"group","objects":[
            {"type":"image","src":"/a.png"},
            {"type":"group","objects":[{"type":"image","src":"/b.png"}]}
        ]}"#;
        let record: SceneRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.image_sources(), vec!["/a.png", "/b.png"]);
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let fetcher = MemoryFetcher::new();
        assert!(deserialize(&[], &fetcher).await.is_empty());
    }

    #[tokio::test]
    async fn roundtrip_preserves_order_and_ids() {
        let fetcher = MemoryFetcher::new().with(
            "/logo.png",
            FetchedAsset::new(testing::png_bytes(4, 2, [10, 20, 30, 255]), None),
        );
        let mut image = SceneObject::new(
            ObjectKind::Image(ImageContent::new("/logo.png")),
            Geometry::centered(350.0, 450.0, 4.0, 2.0),
        );
        image.geometry.scale_to_width(200.0);
        let objects = vec![text_object(), image];

        let records = serialize_objects(&objects);
        let restored = deserialize(&records, &fetcher).await;

        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].id, objects[0].id);
        assert_eq!(restored[1].id, objects[1].id);
        assert_eq!(serialize_objects(&restored), records);

        let ObjectKind::Image(content) = &restored[1].kind else {
            panic!("expected image");
        };
        let payload = content.payload.as_ref().unwrap();
        assert_eq!(payload.size, SizePx::new(4, 2));
        assert_eq!(payload.content_type, "image/png");
    }

    #[tokio::test]
    async fn unreachable_sources_are_dropped() {
        let fetcher = MemoryFetcher::new();
        let records: Vec<SceneRecord> = serde_json::from_str(
            r#"[
                {"type":"rect","width":10,"height":10},
                {"type":"image","src":"/gone.png"},
                {"type":"unknown"},
                {"type":"circle","radius":5}
            ]"#,
        )
        .unwrap();

        let restored = deserialize(&records, &fetcher).await;
        let tags: Vec<_> = restored.iter().map(|o| o.type_tag()).collect();
        assert_eq!(tags, vec!["rect", "circle"]);
        assert_eq!(restored[1].geometry.width, 10.0);
    }

    #[tokio::test]
    async fn undecodable_bytes_are_dropped() {
        let fetcher = MemoryFetcher::new().with(
            "/broken.png",
            FetchedAsset::new(b"not an image".to_vec(), Some("image/png".to_string())),
        );
        let records: Vec<SceneRecord> =
            serde_json::from_str(r#"[{"type":"image","src":"/broken.png"}]"#).unwrap();
        assert!(deserialize(&records, &fetcher).await.is_empty());
    }
}
