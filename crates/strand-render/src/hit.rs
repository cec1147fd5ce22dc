//! Hit testing: canvas point → strand, handle or endpoint.
//!
//! Every query skips hidden strands and strands whose layer chain is
//! invisible. Strand lookups walk layers and strands in reverse paint
//! order so the topmost strand wins.

use kurbo::{Point, Rect};
use strand_core::geometry::point_in_rect;
use strand_core::layer::{LeafLayer, leaf_layers};
use strand_core::{HandleKind, LayerId, LayerNode, Side, Strand, StrandId};

/// Tolerance for strand and control point picking.
pub const HIT_TOLERANCE: f64 = 30.0;
/// Snap radius for attaching a new strand to an endpoint.
pub const ATTACH_RADIUS: f64 = 60.0;
/// Side of the square grab area around each endpoint in move mode.
pub const MOVE_AREA: f64 = 120.0;

/// Samples per segment for closest-distance checks.
const NEAR_SAMPLES: usize = 50;
/// Samples per segment for rubber-band containment.
const RECT_SAMPLES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrandHit {
    pub strand_id: StrandId,
    pub layer_id: LayerId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointHit {
    pub strand_id: StrandId,
    pub layer_id: LayerId,
    pub side: Side,
    pub segment_index: usize,
    /// 0 for a start endpoint, 1 for an end endpoint.
    pub t: f64,
    pub point: Point,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPointHit {
    pub segment_index: usize,
    pub handle: HandleKind,
    pub point: Point,
    pub distance: f64,
}

/// Interactive strands with their owning leaf, in paint order.
fn visible_strands(layers: &[LayerNode]) -> impl Iterator<Item = (LeafLayer<'_>, &Strand)> {
    leaf_layers(layers)
        .into_iter()
        .filter(|leaf| leaf.visible)
        .flat_map(|leaf| {
            leaf.layer
                .strands
                .iter()
                .filter(|s| s.is_interactive())
                .map(move |s| (leaf, s))
        })
}

pub fn is_point_near_strand(strand: &Strand, p: Point, tolerance: f64) -> bool {
    strand.is_interactive()
        && strand
            .segments
            .iter()
            .any(|s| s.bezier.closest_point(p, NEAR_SAMPLES).distance <= tolerance)
}

/// Topmost strand within `tolerance` of `p`.
pub fn find_strand_at_point(layers: &[LayerNode], p: Point, tolerance: f64) -> Option<StrandHit> {
    let strands: Vec<_> = visible_strands(layers).collect();
    strands
        .into_iter()
        .rev()
        .find(|(_, s)| is_point_near_strand(s, p, tolerance))
        .map(|(leaf, s)| StrandHit {
            strand_id: s.id,
            layer_id: leaf.layer.id,
        })
}

/// Every strand within `tolerance` of `p`, bottom first.
pub fn find_all_strands_at_point(layers: &[LayerNode], p: Point, tolerance: f64) -> Vec<StrandHit> {
    visible_strands(layers)
        .filter(|(_, s)| is_point_near_strand(s, p, tolerance))
        .map(|(leaf, s)| StrandHit {
            strand_id: s.id,
            layer_id: leaf.layer.id,
        })
        .collect()
}

/// Nearest of the four handles of any segment, strictly within `tolerance`.
pub fn find_closest_control_point(
    strand: &Strand,
    p: Point,
    tolerance: f64,
) -> Option<ControlPointHit> {
    let mut best: Option<ControlPointHit> = None;
    let mut limit = tolerance;
    for (segment_index, segment) in strand.segments.iter().enumerate() {
        for handle in HandleKind::ALL {
            let point = handle.get(&segment.bezier);
            let distance = point.distance(p);
            if distance < limit {
                limit = distance;
                best = Some(ControlPointHit {
                    segment_index,
                    handle,
                    point,
                    distance,
                });
            }
        }
    }
    best
}

pub fn is_point_in_rect(p: Point, rect: Rect) -> bool {
    point_in_rect(p, rect)
}

/// True when any sampled point of the strand falls inside `rect`.
pub fn is_strand_in_rect(strand: &Strand, rect: Rect) -> bool {
    strand.segments.iter().any(|segment| {
        (0..=RECT_SAMPLES)
            .map(|i| segment.bezier.point_at(i as f64 / RECT_SAMPLES as f64))
            .any(|q| point_in_rect(q, rect))
    })
}

/// Rubber-band selection, bottom first.
pub fn find_strands_in_rect(layers: &[LayerNode], rect: Rect) -> Vec<StrandHit> {
    visible_strands(layers)
        .filter(|(_, s)| is_strand_in_rect(s, rect))
        .map(|(leaf, s)| StrandHit {
            strand_id: s.id,
            layer_id: leaf.layer.id,
        })
        .collect()
}

// ─── Endpoints ──────────────────────────────────────────────────────────

/// A side is a valid anchor when it is unclaimed and is not the start
/// of a strand that is itself attached at its start.
pub fn is_endpoint_attachable(strand: &Strand, side: Side) -> bool {
    !strand.has_circles[side.index()] && !(side == Side::Start && strand.start_attached)
}

fn endpoint_hit(leaf: &LeafLayer<'_>, strand: &Strand, side: Side, p: Point) -> EndpointHit {
    let point = strand.endpoint(side);
    EndpointHit {
        strand_id: strand.id,
        layer_id: leaf.layer.id,
        side,
        segment_index: strand.segment_index_for(side),
        t: side.t(),
        point,
        distance: point.distance(p),
    }
}

fn endpoints(layers: &[LayerNode]) -> impl Iterator<Item = (LeafLayer<'_>, &Strand, Side)> {
    visible_strands(layers)
        .filter(|(_, s)| !s.segments.is_empty())
        .flat_map(|(leaf, s)| [Side::Start, Side::End].map(|side| (leaf, s, side)))
}

/// Nearest attachable endpoint within `radius` (inclusive).
pub fn find_endpoint_attachment(layers: &[LayerNode], p: Point, radius: f64) -> Option<EndpointHit> {
    let mut best: Option<EndpointHit> = None;
    for (leaf, strand, side) in endpoints(layers) {
        if !is_endpoint_attachable(strand, side) {
            continue;
        }
        let hit = endpoint_hit(&leaf, strand, side, p);
        if hit.distance <= radius && best.is_none_or(|b| hit.distance < b.distance) {
            best = Some(hit);
        }
    }
    best
}

/// Every attachable endpoint, for preview rendering.
pub fn attachable_endpoints(layers: &[LayerNode]) -> Vec<EndpointHit> {
    endpoints(layers)
        .filter(|(_, strand, side)| is_endpoint_attachable(strand, *side))
        .map(|(leaf, strand, side)| endpoint_hit(&leaf, strand, side, strand.endpoint(side)))
        .collect()
}

/// Endpoints that can be dragged: unlocked strands, excluding the start
/// of strands pinned at their start.
pub fn movable_endpoints(layers: &[LayerNode]) -> Vec<EndpointHit> {
    endpoints(layers)
        .filter(|(leaf, strand, side)| {
            !(leaf.locked || strand.locked || (*side == Side::Start && strand.start_attached))
        })
        .map(|(leaf, strand, side)| endpoint_hit(&leaf, strand, side, strand.endpoint(side)))
        .collect()
}

/// Endpoint whose square grab area of side `area` contains `p`; the
/// nearest wins when areas overlap.
pub fn find_strand_endpoint_for_move(
    layers: &[LayerNode],
    p: Point,
    area: f64,
) -> Option<EndpointHit> {
    let half = area / 2.0;
    movable_endpoints(layers)
        .into_iter()
        .filter(|e| (e.point.x - p.x).abs() <= half && (e.point.y - p.y).abs() <= half)
        .map(|e| EndpointHit {
            distance: e.point.distance(p),
            ..e
        })
        .fold(None, |best: Option<EndpointHit>, e| match best {
            Some(b) if b.distance <= e.distance => Some(b),
            _ => Some(e),
        })
}
