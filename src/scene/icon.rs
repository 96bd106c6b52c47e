//! Importing icon markup as a group of vector paths.

use resvg::usvg::tiny_skia_path::PathSegment;
use resvg::usvg::{self, Node, Options, Tree};

use crate::error::CodecError;
use crate::geometry::format_number;
use crate::scene::{Geometry, GroupContent, ObjectKind, SceneObject, ShapeKind};

/// Parses SVG markup into a group of path shapes.
///
/// Every drawable path (including text flattened to outlines) becomes a child
/// with its absolute transform baked into its path data, so children sit in
/// the icon's own coordinate box at the origin. The group's intrinsic size is
/// the document size.
///
/// # Example
///
/// ```
/// use garment_mockup::scene::icon::parse_icon;
///
/// let icon = parse_icon(
///     r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="24" height="24">
///          <path d="M2 2h20v20H2z"/>
///        </svg>"#,
/// )
/// .unwrap();
/// assert_eq!(icon.type_tag(), "group");
/// assert_eq!(icon.geometry.width, 24.0);
/// ```
pub fn parse_icon(markup: &str) -> Result<SceneObject, CodecError> {
    let tree = Tree::from_str(markup, &Options::default())
        .map_err(|err| CodecError::Markup(err.to_string()))?;

    let mut children = Vec::new();
    collect_paths(tree.root(), &mut children);
    if children.is_empty() {
        return Err(CodecError::Markup("no drawable paths".to_string()));
    }

    let size = tree.size();
    let geometry = Geometry {
        width: f64::from(size.width()),
        height: f64::from(size.height()),
        ..Geometry::default()
    };

    Ok(SceneObject::new(
        ObjectKind::Group(GroupContent {
            objects: children,
            source: Some(markup.to_string()),
        }),
        geometry,
    ))
}

fn collect_paths(group: &usvg::Group, out: &mut Vec<SceneObject>) {
    for node in group.children() {
        match node {
            Node::Group(child) => collect_paths(child, out),
            Node::Text(text) => collect_paths(text.flattened(), out),
            Node::Path(path) if path.is_visible() => {
                if let Some(shape) = path_object(path) {
                    out.push(shape);
                }
            }
            _ => {}
        }
    }
}

fn path_object(path: &usvg::Path) -> Option<SceneObject> {
    let data = path.data().clone().transform(path.abs_transform())?;
    let d = path_data(&data);
    if d.is_empty() {
        return None;
    }

    let mut object = SceneObject::new(ObjectKind::Shape(ShapeKind::Path { data: d }), Geometry::default());
    object.paint.fill = match path.fill() {
        Some(fill) => paint_color(fill.paint()),
        None => Some("none".to_string()),
    };
    if let Some(stroke) = path.stroke() {
        object.paint.stroke = paint_color(stroke.paint());
        object.paint.stroke_width = f64::from(stroke.width().get());
    }
    Some(object)
}

fn paint_color(paint: &usvg::Paint) -> Option<String> {
    match paint {
        usvg::Paint::Color(c) => Some(format!("#{:02x}{:02x}{:02x}", c.red, c.green, c.blue)),
        _ => None,
    }
}

/// Writes path segments as SVG path data.
fn path_data(path: &usvg::tiny_skia_path::Path) -> String {
    let mut parts = Vec::new();
    let pt = |p: usvg::tiny_skia_path::Point| {
        format!("{} {}", format_number(f64::from(p.x)), format_number(f64::from(p.y)))
    };
    for segment in path.segments() {
        parts.push(match segment {
            PathSegment::MoveTo(p) => format!("M{}", pt(p)),
            PathSegment::LineTo(p) => format!("L{}", pt(p)),
            PathSegment::QuadTo(c, p) => format!("Q{} {}", pt(c), pt(p)),
            PathSegment::CubicTo(c1, c2, p) => format!("C{} {} {}", pt(c1), pt(c2), pt(p)),
            PathSegment::Close => "Z".to_string(),
        });
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PATHS: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10">
        <path d="M0 0H10V10H0Z" fill="#ff0000"/>
        <g transform="translate(10 0)"><path d="M0 0H10V10H0Z" stroke="#00ff00" stroke-width="2" fill="none"/></g>
    </svg>"##;

    #[test]
    fn splits_into_paths() {
        let icon = parse_icon(TWO_PATHS).unwrap();
        let ObjectKind::Group(group) = &icon.kind else {
            panic!("expected group");
        };
        assert_eq!(group.objects.len(), 2);
        assert_eq!(icon.geometry.width, 20.0);
        assert_eq!(icon.geometry.height, 10.0);
        assert!(group.source.as_deref().unwrap().contains("<path"));

        let first = &group.objects[0];
        assert_eq!(first.paint.fill.as_deref(), Some("#ff0000"));

        let second = &group.objects[1];
        assert_eq!(second.paint.fill.as_deref(), Some("none"));
        assert_eq!(second.paint.stroke.as_deref(), Some("#00ff00"));
        assert_eq!(second.paint.stroke_width, 2.0);
        let ObjectKind::Shape(ShapeKind::Path { data }) = &second.kind else {
            panic!("expected path");
        };
        assert!(data.starts_with("M10 0"), "transform not baked in: {data}");
    }

    #[test]
    fn rejects_garbage_and_empty_markup() {
        assert!(matches!(parse_icon("not svg"), Err(CodecError::Markup(_))));
        assert!(matches!(
            parse_icon(r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#),
            Err(CodecError::Markup(_))
        ));
    }
}
