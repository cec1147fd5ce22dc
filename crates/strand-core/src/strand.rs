//! The strand entity: an ordered chain of cubic segments with a style.
//!
//! Strands are values. Every operation returns a new strand and leaves
//! `self` untouched; `start`/`end` mirror the first and last segment
//! endpoints and are refreshed by every operation that moves them.

use crate::geometry::{BezierCurve, DEFAULT_SAMPLES, rotate_point, sampled_bounds};
use crate::id::StrandId;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

pub const DEFAULT_COLOR: &str = "#C8AAE6";
pub const DEFAULT_STROKE_COLOR: &str = "#000000";
pub const DEFAULT_SHADOW_COLOR: &str = "rgba(0, 0, 0, 0.59)";
pub const DEFAULT_WIDTH: f64 = 20.0;
pub const DEFAULT_STROKE_WIDTH: f64 = 4.0;

/// Curvature scalars handed down from parent to child on attach.
pub const DEFAULT_CURVE_RESPONSE_EXPONENT: f64 = 1.5;
pub const DEFAULT_CONTROL_POINT_BASE_FRACTION: f64 = 0.4;
pub const DEFAULT_DISTANCE_MULTIPLIER: f64 = 1.2;

/// Samples per segment for [`Strand::center`].
const CENTER_SAMPLES: usize = 10;
/// Samples per segment for [`Strand::bounding_box`].
const BOUNDS_SAMPLES: usize = 20;

/// The center handle snaps back to the default when this close.
const CENTER_LOCK_RELEASE: f64 = 0.5;
/// An unlocked center this close to the default is left as stored.
const CENTER_EPSILON: f64 = 1e-9;

// ─── Endpoint side ──────────────────────────────────────────────────────

/// An endpoint of a strand. Serialized as `0` (start) or `1` (end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Start,
    End,
}

impl Side {
    pub const fn index(self) -> usize {
        match self {
            Side::Start => 0,
            Side::End => 1,
        }
    }

    pub const fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(Side::Start),
            1 => Some(Side::End),
            _ => None,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Side::Start => Side::End,
            Side::End => Side::Start,
        }
    }

    /// Curve parameter of this endpoint.
    pub const fn t(self) -> f64 {
        match self {
            Side::Start => 0.0,
            Side::End => 1.0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Side::Start => "start",
            Side::End => "end",
        }
    }
}

impl Serialize for Side {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index() as u8)
    }
}

impl<'de> Deserialize<'de> for Side {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Side::from_index(raw as usize)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid side {raw}, expected 0 or 1")))
    }
}

/// `"start"` / `"end"` encoding used by knot connections.
pub mod side_name {
    use super::Side;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(side: &Side, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(side.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Side, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "start" => Ok(Side::Start),
            "end" => Ok(Side::End),
            other => Err(serde::de::Error::custom(format!("invalid end {other:?}"))),
        }
    }
}

// ─── Style ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrandStyle {
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub width: f64,
    pub shadow_enabled: bool,
    pub shadow_color: String,
    pub shadow_offset: Vec2,
    pub shadow_blur: f64,
}

impl Default for StrandStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            width: DEFAULT_WIDTH,
            shadow_enabled: true,
            shadow_color: DEFAULT_SHADOW_COLOR.to_string(),
            shadow_offset: Vec2::new(2.0, 2.0),
            shadow_blur: 4.0,
        }
    }
}

impl StrandStyle {
    pub fn with_color(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
            ..Self::default()
        }
    }

    /// Overlay the fields present in `patch`.
    pub fn patched(&self, patch: &StylePatch) -> Self {
        let mut style = self.clone();
        if let Some(c) = &patch.color {
            style.color.clone_from(c);
        }
        if let Some(c) = &patch.stroke_color {
            style.stroke_color.clone_from(c);
        }
        if let Some(w) = patch.stroke_width {
            style.stroke_width = w;
        }
        if let Some(w) = patch.width {
            style.width = w;
        }
        if let Some(e) = patch.shadow_enabled {
            style.shadow_enabled = e;
        }
        if let Some(c) = &patch.shadow_color {
            style.shadow_color.clone_from(c);
        }
        if let Some(o) = patch.shadow_offset {
            style.shadow_offset = o;
        }
        if let Some(b) = patch.shadow_blur {
            style.shadow_blur = b;
        }
        style
    }
}

/// Partial style update; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StylePatch {
    pub color: Option<String>,
    pub stroke_color: Option<String>,
    pub stroke_width: Option<f64>,
    pub width: Option<f64>,
    pub shadow_enabled: Option<bool>,
    pub shadow_color: Option<String>,
    pub shadow_offset: Option<Vec2>,
    pub shadow_blur: Option<f64>,
}

// ─── Segments and links ─────────────────────────────────────────────────

/// One cubic of a strand plus its cached arc length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub bezier: BezierCurve,
    pub length: f64,
}

impl Segment {
    pub fn new(bezier: BezierCurve) -> Self {
        Self {
            bezier,
            length: bezier.length(DEFAULT_SAMPLES),
        }
    }
}

/// Which of the four Bézier points a handle edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Start,
    Control1,
    Control2,
    End,
}

impl HandleKind {
    pub const ALL: [HandleKind; 4] = [
        HandleKind::Start,
        HandleKind::Control1,
        HandleKind::Control2,
        HandleKind::End,
    ];

    pub fn get(self, c: &BezierCurve) -> Point {
        match self {
            HandleKind::Start => c.start,
            HandleKind::Control1 => c.control1,
            HandleKind::Control2 => c.control2,
            HandleKind::End => c.end,
        }
    }

    pub fn set(self, c: &BezierCurve, p: Point) -> BezierCurve {
        let mut out = *c;
        match self {
            HandleKind::Start => out.start = p,
            HandleKind::Control1 => out.control1 = p,
            HandleKind::Control2 => out.control2 = p,
            HandleKind::End => out.end = p,
        }
        out
    }
}

/// Where an endpoint is pinned on another strand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub strand_id: StrandId,
    pub segment_index: usize,
    pub t: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_side: Option<Side>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Attachment>,
}

impl Attachments {
    pub fn get(&self, side: Side) -> Option<&Attachment> {
        match side {
            Side::Start => self.start.as_ref(),
            Side::End => self.end.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Interval on one segment where this strand crosses another.
/// `is_over == false` marks an under-crossing painted as a gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskSegment {
    pub strand_id: StrandId,
    pub segment_index: usize,
    pub t_start: f64,
    pub t_end: f64,
    pub is_over: bool,
}

impl MaskSegment {
    pub fn contains(&self, segment_index: usize, t: f64) -> bool {
        self.segment_index == segment_index && t >= self.t_start && t <= self.t_end
    }

    pub fn mid_t(&self) -> f64 {
        (self.t_start + self.t_end) / 2.0
    }
}

/// Explicit endpoint-to-endpoint link with a peer strand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnotConnection {
    pub connected_strand_id: StrandId,
    #[serde(with = "side_name")]
    pub connected_end: Side,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KnotConnections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<KnotConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<KnotConnection>,
}

// ─── Strand ─────────────────────────────────────────────────────────────

fn yes() -> bool {
    true
}

fn default_curve_response_exponent() -> f64 {
    DEFAULT_CURVE_RESPONSE_EXPONENT
}

fn default_control_point_base_fraction() -> f64 {
    DEFAULT_CONTROL_POINT_BASE_FRACTION
}

fn default_distance_multiplier() -> f64 {
    DEFAULT_DISTANCE_MULTIPLIER
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strand {
    pub id: StrandId,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub style: StrandStyle,
    #[serde(default)]
    pub closed: bool,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub shadow_only: bool,

    #[serde(default)]
    pub start: Point,
    #[serde(default)]
    pub end: Point,
    #[serde(default)]
    pub control_point1: Point,
    #[serde(default)]
    pub control_point2: Point,
    #[serde(default)]
    pub control_point_center: Point,
    #[serde(default)]
    pub control_point_center_locked: bool,

    #[serde(default)]
    pub has_circles: [bool; 2],
    #[serde(default)]
    pub start_attached: bool,
    #[serde(default)]
    pub end_attached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<StrandId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_side: Option<Side>,
    #[serde(default)]
    pub attached_strand_ids: SmallVec<[StrandId; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knot_connections: Option<KnotConnections>,

    #[serde(default = "default_curve_response_exponent")]
    pub curve_response_exponent: f64,
    #[serde(default = "default_control_point_base_fraction")]
    pub control_point_base_fraction: f64,
    #[serde(default = "default_distance_multiplier")]
    pub distance_multiplier: f64,
    #[serde(default)]
    pub endpoint_tension: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<MaskSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_start_side: Option<bool>,

    // Presentational flags.
    #[serde(default = "yes")]
    pub start_line_visible: bool,
    #[serde(default = "yes")]
    pub end_line_visible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub start_extension_visible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub end_extension_visible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub start_arrow_visible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub end_arrow_visible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub full_arrow_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow_color: Option<String>,

    /// Fields this version does not know about, kept for round-tripping.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Strand {
    /// General constructor. Mirrors and logical handles are derived from
    /// the first and last segments.
    pub fn new(id: StrandId, segments: Vec<Segment>, style: StrandStyle) -> Self {
        let first = segments.first().map(|s| s.bezier);
        let last = segments.last().map(|s| s.bezier);
        let start = first.map_or(Point::ORIGIN, |b| b.start);
        let end = last.map_or(Point::ORIGIN, |b| b.end);
        let control_point1 = first.map_or(start, |b| b.control1);
        let control_point2 = last.map_or(end, |b| b.control2);
        Self {
            id,
            segments,
            style,
            closed: false,
            visible: true,
            locked: false,
            is_hidden: false,
            is_selected: false,
            shadow_only: false,
            start,
            end,
            control_point1,
            control_point2,
            control_point_center: control_point1.midpoint(control_point2),
            control_point_center_locked: false,
            has_circles: [false, false],
            start_attached: false,
            end_attached: false,
            parent_id: None,
            attachment_side: None,
            attached_strand_ids: SmallVec::new(),
            knot_connections: None,
            curve_response_exponent: DEFAULT_CURVE_RESPONSE_EXPONENT,
            control_point_base_fraction: DEFAULT_CONTROL_POINT_BASE_FRACTION,
            distance_multiplier: DEFAULT_DISTANCE_MULTIPLIER,
            endpoint_tension: 0.0,
            attachments: None,
            masks: Vec::new(),
            min_length: None,
            is_start_side: None,
            start_line_visible: true,
            end_line_visible: true,
            start_extension_visible: false,
            end_extension_visible: false,
            start_arrow_visible: false,
            end_arrow_visible: false,
            full_arrow_visible: false,
            arrow_color: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Single segment with controls at 1/3 and 2/3 of the chord.
    pub fn straight(id: StrandId, start: Point, end: Point, style: StrandStyle) -> Self {
        Self::new(id, vec![Segment::new(BezierCurve::line(start, end))], style)
    }

    /// Zero-length strand with every point at `start`. This is the form
    /// an attach drag starts from; it renders as a straight line.
    pub fn initial(id: StrandId, start: Point, style: StrandStyle) -> Self {
        Self::new(id, vec![Segment::new(BezierCurve::point(start))], style)
    }

    /// Freehand strand through `points`, one segment per consecutive pair.
    /// Controls follow neighbouring points with tension 0.3.
    pub fn from_points(id: StrandId, points: &[Point], style: StrandStyle) -> Option<Self> {
        const TENSION: f64 = 0.3;
        if points.len() < 2 {
            return None;
        }
        let segments = points
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let (p0, p3) = (pair[0], pair[1]);
                let prev = if i > 0 { points[i - 1] } else { p0 };
                let next = points.get(i + 2).copied().unwrap_or(p3);
                let t1 = (p3 - prev) / 2.0;
                let t2 = (next - p0) / 2.0;
                Segment::new(BezierCurve::new(
                    p0,
                    p0 + t1 * TENSION,
                    p3 - t2 * TENSION,
                    p3,
                ))
            })
            .collect();
        Some(Self::new(id, segments, style))
    }

    pub fn endpoint(&self, side: Side) -> Point {
        match side {
            Side::Start => self.start,
            Side::End => self.end,
        }
    }

    pub fn last_segment_index(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// Segment index holding the given endpoint.
    pub fn segment_index_for(&self, side: Side) -> usize {
        match side {
            Side::Start => 0,
            Side::End => self.last_segment_index(),
        }
    }

    /// Hidden, invisible or shadow-only strands do not take part in hits.
    pub fn is_interactive(&self) -> bool {
        self.visible && !self.is_hidden
    }

    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    /// Point at fraction `t` of the total arc length.
    pub fn point_at(&self, t: f64) -> Option<Point> {
        let last = self.segments.last()?;
        let target = t * self.total_length();
        let mut accumulated = 0.0;
        for segment in &self.segments {
            if accumulated + segment.length >= target {
                let local = if segment.length > 0.0 {
                    ((target - accumulated) / segment.length).clamp(0.0, 1.0)
                } else if t >= 1.0 {
                    1.0
                } else {
                    0.0
                };
                return Some(segment.bezier.point_at(local));
            }
            accumulated += segment.length;
        }
        Some(last.bezier.end)
    }

    /// Mean of sampled points along every segment.
    pub fn center(&self) -> Point {
        let mut sum = Vec2::ZERO;
        let mut count = 0usize;
        for segment in &self.segments {
            for i in 0..=CENTER_SAMPLES {
                sum += segment.bezier.point_at(i as f64 / CENTER_SAMPLES as f64).to_vec2();
                count += 1;
            }
        }
        if count == 0 {
            return self.start;
        }
        (sum / count as f64).to_point()
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        self.segments
            .iter()
            .map(|s| sampled_bounds(&s.bezier, BOUNDS_SAMPLES))
            .reduce(|a, b| a.union(b))
    }

    // ─── Transforms ─────────────────────────────────────────────────────

    fn map_all_points(&self, f: impl Fn(Point) -> Point) -> Self {
        let mut out = self.clone();
        out.segments = self
            .segments
            .iter()
            .map(|s| Segment::new(s.bezier.map_points(&f)))
            .collect();
        out.control_point1 = f(self.control_point1);
        out.control_point2 = f(self.control_point2);
        out.control_point_center = f(self.control_point_center);
        out.sync_mirrors()
    }

    pub fn translated(&self, offset: Vec2) -> Self {
        let mut out = self.clone();
        out.segments = self
            .segments
            .iter()
            .map(|s| Segment {
                bezier: s.bezier.translated(offset),
                length: s.length,
            })
            .collect();
        out.control_point1 = self.control_point1 + offset;
        out.control_point2 = self.control_point2 + offset;
        out.control_point_center = self.control_point_center + offset;
        out.sync_mirrors()
    }

    pub fn rotated(&self, center: Point, angle: f64) -> Self {
        self.map_all_points(|p| rotate_point(p, center, angle))
    }

    pub fn scaled(&self, factor: f64, origin: Point) -> Self {
        self.map_all_points(|p| origin + (p - origin) * factor)
    }

    /// Refresh `start`/`end` from the segment chain.
    pub fn sync_mirrors(mut self) -> Self {
        if let Some(first) = self.segments.first() {
            self.start = first.bezier.start;
        }
        if let Some(last) = self.segments.last() {
            self.end = last.bezier.end;
        }
        self
    }

    /// Set the endpoint on `side` without touching any control point.
    pub fn with_endpoint_at(&self, side: Side, p: Point) -> Self {
        if self.segments.is_empty() {
            return self.clone();
        }
        let mut out = self.clone();
        let index = self.segment_index_for(side);
        let handle = match side {
            Side::Start => HandleKind::Start,
            Side::End => HandleKind::End,
        };
        out.segments[index] = Segment::new(handle.set(&self.segments[index].bezier, p));
        out.sync_mirrors()
    }

    /// Move the last segment's end; control points stay where they are.
    pub fn update_endpoint(&self, new_end: Point) -> Self {
        self.with_endpoint_at(Side::End, new_end)
    }

    /// Drag an endpoint. The adjacent control point follows only when it
    /// sat exactly on the old endpoint.
    pub fn with_endpoint_dragged(&self, side: Side, p: Point) -> Self {
        if self.segments.is_empty() {
            return self.clone();
        }
        let old = self.endpoint(side);
        let index = self.segment_index_for(side);
        let mut bezier = self.segments[index].bezier;
        let mut out = self.clone();
        match side {
            Side::Start => {
                bezier.start = p;
                if bezier.control1 == old {
                    bezier.control1 = p;
                }
                if out.control_point1 == old {
                    out.control_point1 = p;
                }
            }
            Side::End => {
                bezier.end = p;
                if bezier.control2 == old {
                    bezier.control2 = p;
                }
                if out.control_point2 == old {
                    out.control_point2 = p;
                }
            }
        }
        out.segments[index] = Segment::new(bezier);
        out.sync_mirrors()
    }

    /// Edit one Bézier point of one segment. Shared chain points move on
    /// both neighbours; logical handles follow their segment controls.
    pub fn with_handle(&self, segment_index: usize, handle: HandleKind, p: Point) -> Self {
        let Some(segment) = self.segments.get(segment_index) else {
            return self.clone();
        };
        let mut out = self.clone();
        out.segments[segment_index] = Segment::new(handle.set(&segment.bezier, p));
        match handle {
            HandleKind::Start if segment_index > 0 => {
                let prev = &self.segments[segment_index - 1];
                out.segments[segment_index - 1] =
                    Segment::new(HandleKind::End.set(&prev.bezier, p));
            }
            HandleKind::End if segment_index + 1 < self.segments.len() => {
                let next = &self.segments[segment_index + 1];
                out.segments[segment_index + 1] =
                    Segment::new(HandleKind::Start.set(&next.bezier, p));
            }
            HandleKind::Control1 if segment_index == 0 => out.control_point1 = p,
            HandleKind::Control2 if segment_index == self.last_segment_index() => {
                out.control_point2 = p
            }
            _ => {}
        }
        out.sync_mirrors().with_shape_updated()
    }

    /// Re-derive controls at 1/3 and 2/3 of the chord. Used only when a
    /// loaded strand carries no handles of its own.
    pub fn with_control_points_from_geometry(&self) -> Self {
        let mut out = self.clone();
        let chord = self.end - self.start;
        out.control_point1 = self.start + chord / 3.0;
        out.control_point2 = self.start + chord * 2.0 / 3.0;
        // Midpoint of the chord; averaging the thirds can be off by an ulp.
        out.control_point_center = self.start.midpoint(self.end);
        out.control_point_center_locked = false;
        if out.segments.len() == 1 {
            let b = self.segments[0].bezier;
            out.segments[0] = Segment::new(BezierCurve::new(
                b.start,
                out.control_point1,
                out.control_point2,
                b.end,
            ));
        }
        out
    }

    /// Recompute the center handle; a locked center that has drifted back
    /// onto the default releases its lock.
    pub fn with_shape_updated(&self) -> Self {
        let mut out = self.clone();
        let default_center = self.control_point1.midpoint(self.control_point2);
        if !self.control_point_center_locked {
            if self.control_point_center.distance(default_center) > CENTER_EPSILON {
                out.control_point_center = default_center;
            }
        } else if self.control_point_center.distance(default_center) <= CENTER_LOCK_RELEASE {
            out.control_point_center = default_center;
            out.control_point_center_locked = false;
        }
        out
    }

    /// Pin the center handle at `p`.
    pub fn with_center_locked(&self, p: Point) -> Self {
        let mut out = self.clone();
        out.control_point_center = p;
        out.control_point_center_locked = true;
        out
    }

    pub fn with_style(&self, patch: &StylePatch) -> Self {
        let mut out = self.clone();
        out.style = self.style.patched(patch);
        out
    }

    /// Mark `side` as claimed and register `child`.
    pub fn with_child_registered(&self, side: Side, child: StrandId) -> Self {
        let mut out = self.clone();
        out.has_circles[side.index()] = true;
        if !out.attached_strand_ids.contains(&child) {
            out.attached_strand_ids.push(child);
        }
        out
    }

    /// Reverse of [`Strand::with_child_registered`].
    pub fn with_child_released(&self, child: StrandId, sides: &[Side]) -> Self {
        let mut out = self.clone();
        out.attached_strand_ids.retain(|id| *id != child);
        for side in sides {
            out.has_circles[side.index()] = false;
        }
        out
    }

    /// Mirror and chain checks. `None` when the strand is well formed.
    pub fn shape_violation(&self) -> Option<String> {
        let Some(first) = self.segments.first() else {
            return Some(format!("{}: no segments", self.id));
        };
        if first.bezier.start != self.start {
            return Some(format!("{}: start mirror out of sync", self.id));
        }
        for (i, pair) in self.segments.windows(2).enumerate() {
            if pair[0].bezier.end != pair[1].bezier.start {
                return Some(format!("{}: chain broken after segment {i}", self.id));
            }
        }
        if let Some(last) = self.segments.last()
            && last.bezier.end != self.end
        {
            return Some(format!("{}: end mirror out of sync", self.id));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> StrandId {
        StrandId::intern(s)
    }

    #[test]
    fn initial_strand_is_a_point() {
        let p = Point::new(100.0, 100.0);
        let s = Strand::initial(id("initial"), p, StrandStyle::default());
        let b = s.segments[0].bezier;
        assert_eq!((s.start, s.end), (p, p));
        assert_eq!((b.control1, b.control2, b.end), (p, p, p));
        assert_eq!(s.segments[0].length, 0.0);
    }

    #[test]
    fn update_endpoint_keeps_control_points() {
        let p = Point::new(100.0, 100.0);
        let s = Strand::initial(id("grow"), p, StrandStyle::default());
        let q = Point::new(300.0, 100.0);
        let grown = s.update_endpoint(q);
        assert_eq!(grown.end, q);
        assert_eq!(grown.segments[0].bezier.end, q);
        assert_eq!(grown.segments[0].bezier.control1, p);
        assert_eq!(grown.segments[0].bezier.control2, p);
        assert_eq!(grown.control_point1, s.control_point1);
        assert_eq!(grown.control_point2, s.control_point2);
        assert!((grown.segments[0].length - 200.0).abs() < 1e-6);
    }

    #[test]
    fn straight_places_controls_on_thirds() {
        let s = Strand::straight(
            id("thirds"),
            Point::new(0.0, 0.0),
            Point::new(300.0, 0.0),
            StrandStyle::default(),
        );
        let b = s.segments[0].bezier;
        assert_eq!(b.control1, Point::new(100.0, 0.0));
        assert_eq!(b.control2, Point::new(200.0, 0.0));
    }

    #[test]
    fn point_at_uses_arc_length() {
        let s = Strand::new(
            id("two_segments"),
            vec![
                Segment::new(BezierCurve::line(Point::new(0.0, 0.0), Point::new(100.0, 0.0))),
                Segment::new(BezierCurve::line(Point::new(100.0, 0.0), Point::new(100.0, 300.0))),
            ],
            StrandStyle::default(),
        );
        let mid = s.point_at(0.5).unwrap();
        assert!((mid.x - 100.0).abs() < 1e-6);
        assert!((mid.y - 100.0).abs() < 1e-6);
        assert_eq!(s.point_at(1.0), Some(Point::new(100.0, 300.0)));
        assert_eq!(s.point_at(0.0), Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn point_at_zero_length_strand() {
        let p = Point::new(4.0, 5.0);
        let s = Strand::initial(id("zero"), p, StrandStyle::default());
        assert_eq!(s.point_at(1.0), Some(p));
        assert_eq!(s.point_at(0.0), Some(p));
    }

    #[test]
    fn translate_moves_everything() {
        let s = Strand::straight(
            id("translate"),
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            StrandStyle::default(),
        );
        let moved = s.translated(Vec2::new(5.0, 7.0));
        assert_eq!(moved.start, Point::new(5.0, 7.0));
        assert_eq!(moved.end, Point::new(35.0, 7.0));
        assert_eq!(moved.control_point1, Point::new(15.0, 7.0));
        assert_eq!(moved.shape_violation(), None);
    }

    #[test]
    fn drag_endpoint_moves_coincident_control_only() {
        let p = Point::new(100.0, 100.0);
        let s = Strand::initial(id("drag"), p, StrandStyle::default())
            .update_endpoint(Point::new(300.0, 100.0));
        let dragged = s.with_endpoint_dragged(Side::End, Point::new(320.0, 120.0));
        assert_eq!(dragged.end, Point::new(320.0, 120.0));
        assert_eq!(dragged.segments[0].bezier.control2, p);

        let line = Strand::new(
            id("drag_line"),
            vec![Segment::new(BezierCurve::new(
                Point::new(0.0, 0.0),
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 0.0),
            ))],
            StrandStyle::default(),
        );
        let moved = line.with_endpoint_dragged(Side::Start, Point::new(-10.0, 0.0));
        assert_eq!(moved.segments[0].bezier.control1, Point::new(-10.0, 0.0));
        assert_eq!(moved.control_point1, Point::new(-10.0, 0.0));
    }

    #[test]
    fn handle_edit_keeps_chain() {
        let s = Strand::from_points(
            id("chain"),
            &[
                Point::new(0.0, 0.0),
                Point::new(50.0, 50.0),
                Point::new(100.0, 0.0),
            ],
            StrandStyle::default(),
        )
        .unwrap();
        let edited = s.with_handle(0, HandleKind::End, Point::new(60.0, 70.0));
        assert_eq!(edited.segments[1].bezier.start, Point::new(60.0, 70.0));
        assert_eq!(edited.shape_violation(), None);
    }

    #[test]
    fn from_points_needs_two_points() {
        assert!(Strand::from_points(id("dot"), &[Point::ORIGIN], StrandStyle::default()).is_none());
        let s = Strand::from_points(
            id("dash"),
            &[Point::ORIGIN, Point::new(10.0, 0.0)],
            StrandStyle::default(),
        )
        .unwrap();
        assert_eq!(s.segments.len(), 1);
        assert_eq!(s.segments[0].bezier.control1, Point::new(1.5, 0.0));
        assert_eq!(s.segments[0].bezier.control2, Point::new(8.5, 0.0));
    }

    #[test]
    fn locked_center_releases_near_default() {
        let s = Strand::straight(
            id("center"),
            Point::new(0.0, 0.0),
            Point::new(90.0, 0.0),
            StrandStyle::default(),
        );
        let locked = s.with_center_locked(Point::new(45.3, 0.2));
        let updated = locked.with_shape_updated();
        assert!(!updated.control_point_center_locked);
        assert_eq!(updated.control_point_center, Point::new(45.0, 0.0));

        let far = s.with_center_locked(Point::new(45.0, 20.0)).with_shape_updated();
        assert!(far.control_point_center_locked);
        assert_eq!(far.control_point_center, Point::new(45.0, 20.0));
    }

    #[test]
    fn control_points_from_geometry() {
        let s = Strand::initial(id("geometry"), Point::ORIGIN, StrandStyle::default())
            .update_endpoint(Point::new(90.0, 30.0));
        let derived = s.with_control_points_from_geometry();
        assert_eq!(derived.segments[0].bezier.control1, Point::new(30.0, 10.0));
        assert_eq!(derived.segments[0].bezier.control2, Point::new(60.0, 20.0));
        assert_eq!(derived.control_point_center, Point::new(45.0, 15.0));
    }

    #[test]
    fn derived_center_is_stable_across_reloads() {
        let s = Strand::initial(id("thirds"), Point::new(0.0, 50.0), StrandStyle::default())
            .update_endpoint(Point::new(200.0, 50.0));
        let derived = s.with_control_points_from_geometry();
        assert_eq!(derived.control_point_center, Point::new(100.0, 50.0));
        assert_eq!(derived.with_shape_updated(), derived);

        let json = serde_json::to_string(&derived).unwrap();
        let reloaded: Strand = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, derived);
        assert_eq!(reloaded.with_shape_updated(), derived);
    }

    #[test]
    fn side_serializes_as_index() {
        assert_eq!(serde_json::to_string(&Side::End).unwrap(), "1");
        let s: Side = serde_json::from_str("0").unwrap();
        assert_eq!(s, Side::Start);
        assert!(serde_json::from_str::<Side>("2").is_err());
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let json = r#"{
            "id": "legacy",
            "segments": [{"bezier": {
                "start": {"x": 0, "y": 0}, "control1": {"x": 0, "y": 0},
                "control2": {"x": 0, "y": 0}, "end": {"x": 10, "y": 0}}, "length": 10}],
            "customTag": {"braid": "4-strand"}
        }"#;
        let s: Strand = serde_json::from_str(json).unwrap();
        assert!(s.visible);
        assert_eq!(s.extra["customTag"]["braid"], "4-strand");
        let back = serde_json::to_value(&s).unwrap();
        assert_eq!(back["customTag"]["braid"], "4-strand");
    }
}
