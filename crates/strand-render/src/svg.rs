//! Scene → SVG document.
//!
//! One `<path>` per painted stroke, in scene order, under a root carrying
//! the shared `shadow` blur filter.

use kurbo::{Point, Rect, Vec2};
use strand_core::layer::map_leaves;
use strand_core::{CanvasState, Color, Layer};

use crate::paint::{RenderOptions, Scene, SceneElement, Stroke, render_scene};

/// Margin around the strands in a cropped export.
pub const CROP_PADDING: f64 = 20.0;
/// Samples per segment when measuring the drawing for a crop.
const CROP_SAMPLES: usize = 20;

/// A finished SVG document and the size it was laid out at.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgExport {
    pub svg: String,
    pub width: f64,
    pub height: f64,
    /// Translation applied to canvas coordinates.
    pub offset: Vec2,
}

/// Escape the five XML special characters in attribute values.
fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Resolve a style color to `#rrggbb` plus its alpha. Unparseable values
/// are passed through as written.
fn svg_color(raw: &str) -> (String, f64) {
    match Color::parse(raw) {
        Some(c) => (c.to_hex(), c.a),
        None => (escape_attr(raw), 1.0),
    }
}

fn stroke_attrs(stroke: &Stroke) -> String {
    let (color, alpha) = svg_color(&stroke.color);
    let mut attrs = format!(
        r#"stroke="{color}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round" fill="none" opacity="{}""#,
        stroke.width, stroke.opacity
    );
    if alpha < 1.0 {
        attrs.push_str(&format!(r#" stroke-opacity="{alpha}""#));
    }
    if let Some(dash) = stroke.dash {
        attrs.push_str(&format!(r#" stroke-dasharray="{dash}""#));
    }
    attrs
}

fn write_element(out: &mut String, element: &SceneElement) {
    match element {
        SceneElement::Path {
            d,
            stroke,
            filter,
            offset,
            ..
        } => {
            out.push_str(&format!(r#"  <path d="{d}" {}"#, stroke_attrs(stroke)));
            if *offset != Vec2::ZERO {
                out.push_str(&format!(
                    r#" transform="translate({}, {})""#,
                    offset.x, offset.y
                ));
            }
            if let Some(id) = filter {
                out.push_str(&format!(r#" filter="url(#{id})""#));
            }
            out.push_str(" />\n");
        }
        SceneElement::Circle {
            center,
            radius,
            fill,
            stroke,
            opacity,
            ..
        } => {
            out.push_str(&format!(
                r#"  <circle cx="{}" cy="{}" r="{radius}""#,
                center.x, center.y
            ));
            match fill {
                Some(f) => {
                    let (color, alpha) = svg_color(f);
                    out.push_str(&format!(r#" fill="{color}""#));
                    if alpha < 1.0 {
                        out.push_str(&format!(r#" fill-opacity="{alpha}""#));
                    }
                }
                None => out.push_str(r#" fill="none""#),
            }
            if let Some(s) = stroke {
                let (color, _) = svg_color(&s.color);
                out.push_str(&format!(r#" stroke="{color}" stroke-width="{}""#, s.width));
            }
            out.push_str(&format!(r#" opacity="{opacity}" />"#));
            out.push('\n');
        }
        SceneElement::Rect { rect, stroke, .. } => {
            out.push_str(&format!(
                r#"  <rect x="{}" y="{}" width="{}" height="{}" {} />"#,
                rect.x0,
                rect.y0,
                rect.width(),
                rect.height(),
                stroke_attrs(stroke)
            ));
            out.push('\n');
        }
    }
}

/// Serialize a scene at the given document size.
pub fn scene_to_svg(scene: &Scene, width: f64, height: f64) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        r#"<svg width="{width}" height="{height}" xmlns="http://www.w3.org/2000/svg">"#
    ));
    out.push('\n');
    out.push_str("  <defs>\n");
    out.push_str("    <filter id=\"shadow\">\n");
    out.push_str("      <feGaussianBlur stdDeviation=\"2\" />\n");
    out.push_str("    </filter>\n");
    out.push_str("  </defs>\n");
    for element in &scene.elements {
        write_element(&mut out, element);
    }
    out.push_str("</svg>\n");
    out
}

/// Canvas-sized export of everything visible.
pub fn export_svg(canvas: &CanvasState, width: f64, height: f64) -> SvgExport {
    let scene = render_scene(canvas, &RenderOptions::export());
    SvgExport {
        svg: scene_to_svg(&scene, width, height),
        width,
        height,
        offset: Vec2::ZERO,
    }
}

/// Bounds of every visible strand, sampled along each segment.
pub fn drawing_bounds(canvas: &CanvasState) -> Option<Rect> {
    let points: Vec<Point> = canvas
        .leaf_layers()
        .into_iter()
        .filter(|leaf| leaf.visible)
        .flat_map(|leaf| leaf.layer.strands.iter())
        .filter(|s| s.is_interactive())
        .flat_map(|s| s.segments.iter())
        .flat_map(|seg| {
            (0..=CROP_SAMPLES).map(move |i| seg.bezier.point_at(i as f64 / CROP_SAMPLES as f64))
        })
        .collect();
    let first = points.first()?;
    Some(
        points
            .iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)),
    )
}

/// Export cropped to the drawing plus [`CROP_PADDING`] on every side.
pub fn export_svg_cropped(canvas: &CanvasState) -> SvgExport {
    let Some(bounds) = drawing_bounds(canvas) else {
        log::debug!("nothing visible to crop, exporting padding only");
        return export_svg(canvas, CROP_PADDING * 2.0, CROP_PADDING * 2.0);
    };
    let offset = Vec2::new(CROP_PADDING - bounds.x0, CROP_PADDING - bounds.y0);
    let layers = map_leaves(&canvas.layers, &mut |layer: &Layer| Layer {
        strands: layer.strands.iter().map(|s| s.translated(offset)).collect(),
        ..layer.clone()
    });
    let shifted = canvas.with_layers(layers);
    let width = bounds.width() + CROP_PADDING * 2.0;
    let height = bounds.height() + CROP_PADDING * 2.0;
    let scene = render_scene(&shifted, &RenderOptions::export());
    SvgExport {
        svg: scene_to_svg(&scene, width, height),
        width,
        height,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strand_core::{LayerId, Strand, StrandId, StrandStyle};

    fn single(name: &str, a: Point, b: Point, style: StrandStyle) -> CanvasState {
        let strand = Strand::initial(StrandId::intern(name), a, style).update_endpoint(b);
        let layer = Layer::new(LayerId::intern("svg_layer"), "Svg").with_strand(strand);
        CanvasState::empty().with_layers(vec![layer.into()])
    }

    #[test]
    fn document_skeleton() {
        let svg = scene_to_svg(&Scene::default(), 800.0, 600.0);
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(svg.contains(r#"<svg width="800" height="600" xmlns="http://www.w3.org/2000/svg">"#));
        assert!(svg.contains(r#"<filter id="shadow">"#));
        assert!(svg.contains(r#"<feGaussianBlur stdDeviation="2" />"#));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn translucent_shadow_splits_alpha() {
        let canvas = single(
            "svg_shadow",
            Point::new(100.0, 100.0),
            Point::new(300.0, 100.0),
            StrandStyle::default(),
        );
        let out = export_svg(&canvas, 400.0, 200.0).svg;
        let paths: Vec<&str> = out.lines().filter(|l| l.trim_start().starts_with("<path")).collect();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].contains(r##"stroke="#000000""##), "{}", paths[0]);
        assert!(paths[0].contains(r#"stroke-opacity="0.59""#));
        assert!(paths[0].contains(r#"transform="translate(2, 2)""#));
        assert!(paths[0].contains(r#"filter="url(#shadow)""#));
        assert!(paths[2].contains(r#"d="M 100 100 L 300 100""#));
        assert!(paths[2].contains(r##"stroke="#c8aae6""##));
        assert!(!paths[2].contains("stroke-opacity"));
    }

    #[test]
    fn unknown_colors_are_escaped() {
        let style = StrandStyle::with_color("url(\"x\")", 10.0);
        let canvas = single("svg_escape", Point::ZERO, Point::new(50.0, 0.0), style);
        let out = export_svg(&canvas, 100.0, 100.0).svg;
        assert!(out.contains("url(&quot;x&quot;)"));
    }

    #[test]
    fn cropped_export_pads_the_drawing() {
        let canvas = single(
            "svg_crop",
            Point::new(100.0, 100.0),
            Point::new(300.0, 150.0),
            StrandStyle::default(),
        );
        let export = export_svg_cropped(&canvas);
        assert_eq!(export.width, 240.0);
        assert_eq!(export.height, 90.0);
        assert_eq!(export.offset, Vec2::new(-80.0, -80.0));
        assert!(export.svg.contains(r#"d="M 20 20 L 220 70""#), "{}", export.svg);
        assert!(export.svg.contains(r#"<svg width="240" height="90""#));
    }

    #[test]
    fn cropped_export_of_empty_canvas() {
        let export = export_svg_cropped(&CanvasState::new());
        assert_eq!((export.width, export.height), (40.0, 40.0));
        assert!(!export.svg.contains("<path"));
    }
}
