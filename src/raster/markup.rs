//! Scene objects as SVG markup.
//!
//! Each object is emitted in its local box `(0, 0)..(width, height)` inside a
//! transform that places the origin point at `(left, top)`, rotates, then
//! scales. Group members are positioned inside the group's local box.

use crate::fonts::TextLayout;
use crate::geometry::{SizePx, format_number as num};
use crate::scene::{ImageContent, ObjectKind, Paint, SceneObject, ShapeKind, TextAlign, TextContent};

/// Resolves an image to an `href` value; `None` skips the image.
pub(crate) type HrefResolver<'a> = dyn Fn(&ImageContent) -> Option<String> + 'a;

/// Builds a full-surface SVG document drawing one object.
///
/// Returns `None` when the object has nothing drawable.
pub(crate) fn document(
    object: &SceneObject,
    size: SizePx,
    layout: &TextLayout<'_>,
    resolve_href: &HrefResolver<'_>,
) -> Option<String> {
    let mut writer = MarkupWriter {
        layout,
        resolve_href,
        defs: String::new(),
        next_id: 0,
    };
    let body = writer.element(object)?;

    Some(format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" "#,
            r#"width="{w}" height="{h}" viewBox="0 0 {w} {h}"><defs>{defs}</defs>{body}</svg>"#
        ),
        w = size.width,
        h = size.height,
        defs = writer.defs,
        body = body,
    ))
}

struct MarkupWriter<'a> {
    layout: &'a TextLayout<'a>,
    resolve_href: &'a HrefResolver<'a>,
    defs: String,
    next_id: usize,
}

impl MarkupWriter<'_> {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn element(&mut self, object: &SceneObject) -> Option<String> {
        let g = &object.geometry;
        let (w, h) = (g.width, g.height);

        let content = match &object.kind {
            ObjectKind::Text(text) => self.text(text, w, &object.paint),
            ObjectKind::Image(image) => self.image(image, w, h, &object.paint)?,
            ObjectKind::Group(group) => {
                let children: String = group.objects.iter().filter_map(|child| self.element(child)).collect();
                if children.is_empty() {
                    return None;
                }
                format!("<g{}>{}</g>", paint_attrs(&object.paint), children)
            }
            ObjectKind::Shape(shape) => shape_element(shape, w, h, &object.paint),
        };

        let transform = format!(
            "translate({} {}) rotate({}) scale({} {}) translate({} {})",
            num(g.left),
            num(g.top),
            num(g.angle),
            num(g.scale_x),
            num(g.scale_y),
            num(-g.origin_x.factor() * w),
            num(-g.origin_y.factor() * h),
        );

        let clip_attr = match &object.paint.clip {
            Some(clip) => {
                let id = self.fresh_id("clip");
                self.defs.push_str(&format!(
                    r#"<clipPath id="{}"><rect x="{}" y="{}" width="{}" height="{}" rx="{}" ry="{}"/></clipPath>"#,
                    id,
                    num(w / 2.0 + clip.left),
                    num(h / 2.0 + clip.top),
                    num(clip.width),
                    num(clip.height),
                    num(clip.rx),
                    num(clip.ry),
                ));
                format!(r#" clip-path="url(#{})""#, id)
            }
            None => String::new(),
        };

        let mut element = format!(r#"<g transform="{}"><g{}>{}</g></g>"#, transform, clip_attr, content);

        if let Some(shadow) = &object.paint.shadow {
            let id = self.fresh_id("shadow");
            self.defs.push_str(&format!(
                concat!(
                    r#"<filter id="{}" x="-50%" y="-50%" width="200%" height="200%">"#,
                    r#"<feDropShadow dx="{}" dy="{}" stdDeviation="{}" flood-color="{}"/></filter>"#
                ),
                id,
                num(shadow.offset_x),
                num(shadow.offset_y),
                num(shadow.blur / 2.0),
                escape(&shadow.color),
            ));
            element = format!(r#"<g filter="url(#{})">{}</g>"#, id, element);
        }

        Some(element)
    }

    fn text(&self, text: &TextContent, width: f64, paint: &Paint) -> String {
        let (anchor, x) = match text.text_align {
            TextAlign::Left | TextAlign::Justify => ("start", 0.0),
            TextAlign::Center => ("middle", width / 2.0),
            TextAlign::Right => ("end", width),
        };
        let line_height = text.font_size * TextContent::LINE_HEIGHT;
        let baseline = text.font_size * 0.9;

        let mut spans = String::new();
        for (i, line) in self.layout.wrap(text, width).iter().enumerate() {
            spans.push_str(&format!(
                r#"<tspan x="{}" y="{}">{}</tspan>"#,
                num(x),
                num(baseline + line_height * i as f64),
                escape(line),
            ));
        }

        format!(
            r#"<text font-family="{}" font-size="{}" text-anchor="{}" xml:space="preserve"{}>{}</text>"#,
            escape(&font_stack(&text.font_family, self.layout.fallback_family())),
            num(text.font_size),
            anchor,
            paint_attrs(paint),
            spans,
        )
    }

    fn image(&self, image: &ImageContent, w: f64, h: f64, paint: &Paint) -> Option<String> {
        let href = (self.resolve_href)(image)?;
        let mut out = format!(
            r#"<image width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/>"#,
            num(w),
            num(h),
            escape(&href),
        );
        if let Some(border) = stroke_attrs(paint) {
            out.push_str(&format!(
                r#"<rect width="{}" height="{}" fill="none"{}/>"#,
                num(w),
                num(h),
                border
            ));
        }
        Some(out)
    }
}

fn shape_element(shape: &ShapeKind, w: f64, h: f64, paint: &Paint) -> String {
    let attrs = paint_attrs(paint);
    match shape {
        ShapeKind::Rect { rx, ry } => format!(
            r#"<rect width="{}" height="{}" rx="{}" ry="{}"{}/>"#,
            num(w),
            num(h),
            num(*rx),
            num(*ry),
            attrs
        ),
        ShapeKind::Circle { radius } => format!(
            r#"<circle cx="{r}" cy="{r}" r="{r}"{attrs}/>"#,
            r = num(*radius),
            attrs = attrs
        ),
        ShapeKind::Path { data } => format!(r#"<path d="{}"{}/>"#, escape(data), attrs),
    }
}

fn paint_attrs(paint: &Paint) -> String {
    let mut out = String::new();
    if let Some(fill) = &paint.fill {
        out.push_str(&format!(r#" fill="{}""#, escape(fill)));
    }
    if let Some(stroke) = stroke_attrs(paint) {
        out.push_str(&stroke);
    }
    out
}

fn stroke_attrs(paint: &Paint) -> Option<String> {
    let stroke = paint.stroke.as_ref()?;
    if paint.stroke_width <= 0.0 {
        return None;
    }
    let mut out = format!(
        r#" stroke="{}" stroke-width="{}""#,
        escape(stroke),
        num(paint.stroke_width)
    );
    if paint.stroke_uniform {
        out.push_str(r#" vector-effect="non-scaling-stroke""#);
    }
    Some(out)
}

fn font_stack(family: &str, fallback: &str) -> String {
    let family = family.trim();
    if family.is_empty() || family.eq_ignore_ascii_case(fallback) {
        return fallback.to_string();
    }
    if family.contains(' ') {
        format!("'{}', {}", family.replace('\'', ""), fallback)
    } else {
        format!("{}, {}", family, fallback)
    }
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
