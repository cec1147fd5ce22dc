//! Canvas snapshot → flat list of drawing elements.
//!
//! The scene is backend-neutral: [`crate::svg`] serializes it, an
//! interactive host can paint it directly. Elements are in paint order.

use kurbo::{Point, Rect, Vec2};
use strand_core::layer::LeafLayer;
use strand_core::{BezierCurve, CanvasState, Layer, Strand, StrandId};

use crate::hit::{ATTACH_RADIUS, MOVE_AREA, attachable_endpoints, movable_endpoints};

const HALO_COLOR: &str = "#00ffff";
const HALO_OPACITY: f64 = 0.3;
const MASK_GAP_COLOR: &str = "#ffffff";
const GRID_COLOR: &str = "#cccccc";
const GRID_WIDTH: f64 = 0.5;
const GRID_OPACITY: f64 = 0.3;
const SHADOW_OPACITY: f64 = 0.5;
const CONTROL_LINE_COLOR: &str = "#888888";
const CONTROL_OPACITY: f64 = 0.7;
const DASH: &str = "4,4";
const ATTACH_COLOR: &str = "#00ff00";
const MARKER_RADIUS: f64 = 12.0;
const MOVE_COLOR: &str = "#0080ff";
/// Side of the square drawn over a movable endpoint; half the grab area.
const MOVE_MARKER_SIZE: f64 = MOVE_AREA / 2.0;

/// What an element is for. Exporters and tests filter on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaintRole {
    Grid,
    Shadow,
    Border,
    Fill,
    MaskGap,
    Halo,
    ControlLine,
    ControlPoint,
    AttachRing,
    AttachMarker,
    MoveArea,
    Preview,
    Rubberband,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    pub dash: Option<&'static str>,
}

impl Stroke {
    fn solid(color: impl Into<String>, width: f64, opacity: f64) -> Self {
        Self {
            color: color.into(),
            width,
            opacity,
            dash: None,
        }
    }

    fn dashed(mut self, dash: &'static str) -> Self {
        self.dash = Some(dash);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneElement {
    Path {
        role: PaintRole,
        strand: Option<StrandId>,
        d: String,
        stroke: Stroke,
        /// Id of a `<defs>` filter to apply.
        filter: Option<&'static str>,
        offset: Vec2,
    },
    Circle {
        role: PaintRole,
        center: Point,
        radius: f64,
        fill: Option<String>,
        stroke: Option<Stroke>,
        opacity: f64,
    },
    Rect {
        role: PaintRole,
        rect: Rect,
        stroke: Stroke,
    },
}

impl SceneElement {
    pub fn role(&self) -> PaintRole {
        match self {
            Self::Path { role, .. } | Self::Circle { role, .. } | Self::Rect { role, .. } => *role,
        }
    }

    fn path(role: PaintRole, strand: Option<StrandId>, d: String, stroke: Stroke) -> Self {
        Self::Path {
            role,
            strand,
            d,
            stroke,
            filter: None,
            offset: Vec2::ZERO,
        }
    }
}

/// Which endpoint targets to overlay for the active tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overlay {
    #[default]
    None,
    AttachTargets,
    MoveTargets,
}

/// Rubber line shown while an attach gesture is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewLine {
    pub from: Point,
    pub to: Point,
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub show_shadows: bool,
    pub show_selection: bool,
    pub show_control_points: bool,
    /// Area the grid must cover. No grid is drawn without one.
    pub viewport: Option<Rect>,
    pub overlay: Overlay,
    pub preview: Option<PreviewLine>,
    pub rubberband: Option<Rect>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_shadows: true,
            show_selection: true,
            show_control_points: false,
            viewport: None,
            overlay: Overlay::None,
            preview: None,
            rubberband: None,
        }
    }
}

impl RenderOptions {
    /// Strands and shadows only, as written to exported files.
    pub fn export() -> Self {
        Self {
            show_selection: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub elements: Vec<SceneElement>,
}

impl Scene {
    pub fn with_role(&self, role: PaintRole) -> impl Iterator<Item = &SceneElement> {
        self.elements.iter().filter(move |e| e.role() == role)
    }

    /// Path data of every element with `role`, in paint order.
    pub fn paths(&self, role: PaintRole) -> Vec<&str> {
        self.with_role(role)
            .filter_map(|e| match e {
                SceneElement::Path { d, .. } => Some(d.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// SVG path data for one segment. Nascent segments are drawn straight.
pub fn segment_path(b: &BezierCurve) -> String {
    if b.is_nascent() {
        format!("M {} {} L {} {}", b.start.x, b.start.y, b.end.x, b.end.y)
    } else {
        format!(
            "M {} {} C {} {}, {} {}, {} {}",
            b.start.x, b.start.y, b.control1.x, b.control1.y, b.control2.x, b.control2.y, b.end.x,
            b.end.y
        )
    }
}

fn line_path(a: Point, b: Point) -> String {
    format!("M {} {} L {} {}", a.x, a.y, b.x, b.y)
}

pub fn render_scene(canvas: &CanvasState, options: &RenderOptions) -> Scene {
    let mut out = Vec::new();

    if canvas.grid_enabled
        && let Some(viewport) = options.viewport
    {
        paint_grid(&mut out, viewport, canvas.grid_size);
    }

    for leaf in canvas.leaf_layers() {
        if leaf.visible {
            paint_layer(&mut out, canvas, &leaf, options);
        }
    }

    match options.overlay {
        Overlay::None => {}
        Overlay::AttachTargets => {
            for e in attachable_endpoints(&canvas.layers) {
                out.push(SceneElement::Circle {
                    role: PaintRole::AttachRing,
                    center: e.point,
                    radius: ATTACH_RADIUS,
                    fill: None,
                    stroke: Some(Stroke::solid(ATTACH_COLOR, 2.0, 1.0)),
                    opacity: 0.4,
                });
                out.push(SceneElement::Circle {
                    role: PaintRole::AttachMarker,
                    center: e.point,
                    radius: MARKER_RADIUS,
                    fill: Some(ATTACH_COLOR.to_string()),
                    stroke: None,
                    opacity: 0.8,
                });
            }
        }
        Overlay::MoveTargets => {
            for e in movable_endpoints(&canvas.layers) {
                out.push(SceneElement::Rect {
                    role: PaintRole::MoveArea,
                    rect: Rect::from_center_size(e.point, (MOVE_MARKER_SIZE, MOVE_MARKER_SIZE)),
                    stroke: Stroke::solid(MOVE_COLOR, 2.0, 0.8).dashed(DASH),
                });
            }
        }
    }

    if let Some(preview) = &options.preview {
        out.push(SceneElement::path(
            PaintRole::Preview,
            None,
            line_path(preview.from, preview.to),
            Stroke::solid(preview.color.clone(), preview.width, 0.7),
        ));
    }
    if let Some(rect) = options.rubberband {
        out.push(SceneElement::Rect {
            role: PaintRole::Rubberband,
            rect: rect.abs(),
            stroke: Stroke::solid(HALO_COLOR, 2.0, 1.0).dashed(DASH),
        });
    }

    Scene { elements: out }
}

fn paint_grid(out: &mut Vec<SceneElement>, viewport: Rect, size: f64) {
    if size <= 0.0 {
        return;
    }
    let v = viewport.abs();
    let stroke = Stroke::solid(GRID_COLOR, GRID_WIDTH, GRID_OPACITY);
    let mut x = (v.x0 / size).floor() * size;
    while x <= v.x1 {
        out.push(SceneElement::path(
            PaintRole::Grid,
            None,
            line_path(Point::new(x, v.y0), Point::new(x, v.y1)),
            stroke.clone(),
        ));
        x += size;
    }
    let mut y = (v.y0 / size).floor() * size;
    while y <= v.y1 {
        out.push(SceneElement::path(
            PaintRole::Grid,
            None,
            line_path(Point::new(v.x0, y), Point::new(v.x1, y)),
            stroke.clone(),
        ));
        y += size;
    }
}

fn paint_layer(
    out: &mut Vec<SceneElement>,
    canvas: &CanvasState,
    leaf: &LeafLayer<'_>,
    options: &RenderOptions,
) {
    let layer: &Layer = leaf.layer;
    for strand in layer.strands.iter().filter(|s| s.is_interactive()) {
        paint_strand(out, strand, layer.opacity, options);
        let selected = canvas.selected_strand_id == Some(strand.id) || strand.is_selected;
        if options.show_selection && selected {
            paint_selection(out, strand, options.show_control_points);
        }
    }
}

fn paint_strand(out: &mut Vec<SceneElement>, strand: &Strand, opacity: f64, options: &RenderOptions) {
    let style = &strand.style;
    for (index, segment) in strand.segments.iter().enumerate() {
        let d = segment_path(&segment.bezier);

        if style.shadow_enabled && options.show_shadows {
            out.push(SceneElement::Path {
                role: PaintRole::Shadow,
                strand: Some(strand.id),
                d: d.clone(),
                stroke: Stroke::solid(
                    style.shadow_color.clone(),
                    style.width + 2.0 * style.stroke_width,
                    SHADOW_OPACITY * opacity,
                ),
                filter: Some("shadow"),
                offset: style.shadow_offset,
            });
        }
        if !strand.shadow_only {
            out.push(SceneElement::path(
                PaintRole::Border,
                Some(strand.id),
                d.clone(),
                Stroke::solid(
                    style.stroke_color.clone(),
                    style.width + 2.0 * style.stroke_width,
                    opacity,
                ),
            ));
            out.push(SceneElement::path(
                PaintRole::Fill,
                Some(strand.id),
                d,
                Stroke::solid(style.color.clone(), style.width, opacity),
            ));
        }

        for mask in strand
            .masks
            .iter()
            .filter(|m| !m.is_over && m.segment_index == index)
        {
            let a = segment.bezier.point_at(mask.t_start);
            let b = segment.bezier.point_at(mask.t_end);
            out.push(SceneElement::path(
                PaintRole::MaskGap,
                Some(strand.id),
                line_path(a, b),
                Stroke::solid(MASK_GAP_COLOR, style.width + 4.0, opacity),
            ));
        }
    }
}

fn paint_selection(out: &mut Vec<SceneElement>, strand: &Strand, control_points: bool) {
    for segment in &strand.segments {
        out.push(SceneElement::path(
            PaintRole::Halo,
            Some(strand.id),
            segment_path(&segment.bezier),
            Stroke::solid(HALO_COLOR, strand.style.width + 4.0, HALO_OPACITY),
        ));
    }
    if !control_points {
        return;
    }
    for segment in &strand.segments {
        let b = &segment.bezier;
        let polygon = Stroke::solid(CONTROL_LINE_COLOR, 1.0, 0.5).dashed(DASH);
        for (from, to) in [(b.start, b.control1), (b.control2, b.end)] {
            out.push(SceneElement::path(
                PaintRole::ControlLine,
                Some(strand.id),
                line_path(from, to),
                polygon.clone(),
            ));
        }
        for (center, radius, color) in [
            (b.start, 6.0, "#00ff00"),
            (b.control1, 4.0, "#ffff00"),
            (b.control2, 4.0, "#ffff00"),
            (b.end, 6.0, "#ff0000"),
        ] {
            out.push(SceneElement::Circle {
                role: PaintRole::ControlPoint,
                center,
                radius,
                fill: Some(color.to_string()),
                stroke: None,
                opacity: CONTROL_OPACITY,
            });
        }
    }
}
