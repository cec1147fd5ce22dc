//! The canvas snapshot: the whole editable document plus view state.
//!
//! A `CanvasState` is replaced wholesale on every edit. Helpers here
//! rebuild the layer tree around a changed strand or layer and keep
//! attached children pinned to their parents.

use crate::error::ModelError;
use crate::id::{LayerId, StrandId};
use crate::layer::{self, Layer, LayerNode, LeafLayer};
use crate::strand::{Segment, Side, Strand};
use kurbo::{Point, Vec2};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub const DEFAULT_GRID_SIZE: f64 = 20.0;
pub const DEFAULT_LAYER_ID: &str = "layer-1";
pub const DEFAULT_LAYER_NAME: &str = "Set 1";

fn one() -> f64 {
    1.0
}

fn default_grid_size() -> f64 {
    DEFAULT_GRID_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    pub layers: Vec<LayerNode>,
    #[serde(default)]
    pub selected_layer_id: Option<LayerId>,
    #[serde(default)]
    pub selected_strand_id: Option<StrandId>,
    #[serde(default = "one")]
    pub zoom: f64,
    #[serde(default)]
    pub pan_offset: Vec2,
    #[serde(default)]
    pub grid_enabled: bool,
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasState {
    /// A fresh document with one empty layer, selected.
    pub fn new() -> Self {
        let id = LayerId::intern(DEFAULT_LAYER_ID);
        Self {
            layers: vec![Layer::new(id, DEFAULT_LAYER_NAME).into()],
            selected_layer_id: Some(id),
            ..Self::empty()
        }
    }

    /// No layers at all.
    pub fn empty() -> Self {
        Self {
            layers: Vec::new(),
            selected_layer_id: None,
            selected_strand_id: None,
            zoom: 1.0,
            pan_offset: Vec2::ZERO,
            grid_enabled: false,
            grid_size: DEFAULT_GRID_SIZE,
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────

    pub fn leaf_layers(&self) -> Vec<LeafLayer<'_>> {
        layer::leaf_layers(&self.layers)
    }

    /// Every strand in paint order.
    pub fn strands(&self) -> Vec<&Strand> {
        self.layers.iter().flat_map(LayerNode::all_strands).collect()
    }

    pub fn strand(&self, id: StrandId) -> Option<&Strand> {
        self.find_strand(id).map(|(_, s)| s)
    }

    /// The strand and the flat layer that owns it.
    pub fn find_strand(&self, id: StrandId) -> Option<(&Layer, &Strand)> {
        self.leaf_layers()
            .into_iter()
            .find_map(|leaf| leaf.layer.strand(id).map(|s| (leaf.layer, s)))
    }

    pub fn node(&self, id: LayerId) -> Option<&LayerNode> {
        layer::find_node(&self.layers, id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.node(id).and_then(LayerNode::as_layer)
    }

    pub fn selected_strand(&self) -> Option<&Strand> {
        self.selected_strand_id.and_then(|id| self.strand(id))
    }

    pub fn strand_map(&self) -> HashMap<StrandId, Strand> {
        self.strands().into_iter().map(|s| (s.id, s.clone())).collect()
    }

    /// Strand is locked itself or through its layer chain.
    pub fn is_strand_locked(&self, id: StrandId) -> bool {
        self.leaf_layers().into_iter().any(|leaf| {
            leaf.layer
                .strand(id)
                .is_some_and(|s| s.locked || leaf.locked)
        })
    }

    /// Convert a screen position to canvas coordinates.
    pub fn to_canvas(&self, screen: Point) -> Point {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        ((screen - self.pan_offset).to_vec2() / zoom).to_point()
    }

    // ─── Rebuilders ─────────────────────────────────────────────────────

    pub fn with_layers(&self, layers: Vec<LayerNode>) -> Self {
        Self {
            layers,
            ..self.clone()
        }
    }

    /// Replace the node `id` by `f(node)`. `None` if the node is absent.
    pub fn with_node_updated(
        &self,
        id: LayerId,
        mut f: impl FnMut(&LayerNode) -> LayerNode,
    ) -> Option<Self> {
        layer::map_node(&self.layers, id, &mut f).map(|layers| self.with_layers(layers))
    }

    /// Replace the flat layer `id` by `f(layer)`. `None` if absent or a group.
    pub fn with_layer_updated(
        &self,
        id: LayerId,
        mut f: impl FnMut(&Layer) -> Layer,
    ) -> Option<Self> {
        self.layer(id)?;
        self.with_node_updated(id, |node| match node {
            LayerNode::Layer(l) => LayerNode::Layer(f(l)),
            LayerNode::Group(_) => node.clone(),
        })
    }

    pub fn with_strand_added(&self, layer_id: LayerId, strand: Strand) -> Option<Self> {
        self.with_layer_updated(layer_id, |l| l.with_strand(strand.clone()))
    }

    /// Replace every strand whose id appears in `strands`.
    pub fn with_strands_replaced(&self, strands: &[Strand]) -> Self {
        if strands.is_empty() {
            return self.clone();
        }
        let by_id: HashMap<StrandId, &Strand> = strands.iter().map(|s| (s.id, s)).collect();
        let layers = layer::map_leaves(&self.layers, &mut |l| {
            if l.strands.iter().any(|s| by_id.contains_key(&s.id)) {
                let mut out = l.clone();
                for slot in &mut out.strands {
                    if let Some(s) = by_id.get(&slot.id) {
                        *slot = (*s).clone();
                    }
                }
                out
            } else {
                l.clone()
            }
        });
        self.with_layers(layers)
    }

    pub fn with_strand_replaced(&self, strand: &Strand) -> Self {
        self.with_strands_replaced(std::slice::from_ref(strand))
    }

    /// Remove a strand and clean up the links pointing at it.
    pub fn with_strand_removed(&self, id: StrandId) -> Self {
        let Some(removed) = self.strand(id).cloned() else {
            return self.clone();
        };
        let layers = layer::map_leaves(&self.layers, &mut |l| l.without_strand(id));
        let mut next = self.with_layers(layers);

        let mut touched = Vec::new();
        for other in next.strands() {
            let mut s = other.clone();
            if s.attachment(Side::Start).is_some_and(|a| a.strand_id == id) {
                s = s.detach_start();
            }
            if s.attachment(Side::End).is_some_and(|a| a.strand_id == id) {
                s = s.detach_end();
            }
            if s.attached_strand_ids.contains(&id) {
                let sides: Vec<Side> = [Side::Start, Side::End]
                    .into_iter()
                    .filter_map(|own| removed.attachment(own))
                    .filter(|a| a.strand_id == s.id)
                    .filter_map(|a| a.attachment_side)
                    .collect();
                s = s.with_child_released(id, &sides);
            }
            s.masks.retain(|m| m.strand_id != id);
            if s != *other {
                touched.push(s);
            }
        }
        next = next.with_strands_replaced(&touched);
        if next.selected_strand_id == Some(id) {
            next.selected_strand_id = None;
        }
        next
    }

    /// Drop selection ids that no longer resolve.
    pub fn with_selection_pruned(&self) -> Self {
        let mut out = self.clone();
        if let Some(layer_id) = out.selected_layer_id
            && out.node(layer_id).is_none()
        {
            out.selected_layer_id = None;
        }
        if let Some(strand_id) = out.selected_strand_id {
            let ok = match out.selected_layer_id.and_then(|l| out.layer(l)) {
                Some(l) => l.strand(strand_id).is_some(),
                None => out.strand(strand_id).is_some(),
            };
            if !ok {
                out.selected_strand_id = None;
            }
        }
        out
    }

    // ─── Attachment propagation ─────────────────────────────────────────

    /// Re-pin every attached strand to its parents, parents first.
    ///
    /// Children are visited in topological order of the parent → child
    /// graph so chains converge in one sweep. A cycle falls back to paint
    /// order.
    pub fn with_attachments_propagated(&self) -> Self {
        let strands = self.strands();
        let mut graph = DiGraph::<StrandId, ()>::new();
        let index: HashMap<StrandId, _> = strands
            .iter()
            .map(|s| (s.id, graph.add_node(s.id)))
            .collect();
        for s in &strands {
            for parent in s.parent_ids() {
                if let (Some(&from), Some(&to)) = (index.get(&parent), index.get(&s.id)) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        let order: Vec<StrandId> = match toposort(&graph, None) {
            Ok(nodes) => nodes.into_iter().map(|n| graph[n]).collect(),
            Err(cycle) => {
                log::warn!(
                    "attachment cycle through strand {}; propagating in paint order",
                    graph[cycle.node_id()]
                );
                strands.iter().map(|s| s.id).collect()
            }
        };

        let mut map = self.strand_map();
        let mut changed = HashSet::new();
        for id in order {
            let Some(s) = map.get(&id) else {
                continue;
            };
            if !s.is_attached() {
                continue;
            }
            let updated = s.with_attached_positions(&map);
            if updated != *s {
                map.insert(id, updated);
                changed.insert(id);
            }
        }
        let replaced: Vec<Strand> = changed.into_iter().filter_map(|id| map.remove(&id)).collect();
        self.with_strands_replaced(&replaced)
    }

    // ─── Validation ─────────────────────────────────────────────────────

    /// Check the invariants of the given strands and of the selection.
    pub fn validate_strands(&self, ids: &[StrandId]) -> Result<(), ModelError> {
        for &id in ids {
            let strand = self.strand(id).ok_or(ModelError::MissingStrand(id))?;
            self.validate_strand(strand)?;
        }
        self.validate_selection()
    }

    /// Check every strand and the selection.
    pub fn validate(&self) -> Result<(), ModelError> {
        for strand in self.strands() {
            self.validate_strand(strand)?;
        }
        self.validate_selection()
    }

    fn validate_strand(&self, strand: &Strand) -> Result<(), ModelError> {
        if let Some(problem) = strand.shape_violation() {
            return Err(ModelError::BrokenShape(problem));
        }
        for parent in strand.parent_ids() {
            if self.strand(parent).is_none() {
                return Err(ModelError::DanglingAttachment {
                    child: strand.id,
                    parent,
                });
            }
        }
        if strand.start_attached
            && let Some(parent_id) = strand.parent_id
        {
            let parent = self.strand(parent_id).ok_or(ModelError::DanglingAttachment {
                child: strand.id,
                parent: parent_id,
            })?;
            let side = strand.attachment_side.unwrap_or(Side::End);
            if !parent.attached_strand_ids.contains(&strand.id) || !parent.has_circles[side.index()]
            {
                return Err(ModelError::UnregisteredChild {
                    child: strand.id,
                    parent: parent_id,
                });
            }
        }
        for (index, m) in strand.masks.iter().enumerate() {
            if !(0.0 <= m.t_start && m.t_start <= m.t_end && m.t_end <= 1.0) {
                return Err(ModelError::InvalidMask {
                    strand: strand.id,
                    index,
                    t_start: m.t_start,
                    t_end: m.t_end,
                });
            }
        }
        Ok(())
    }

    fn validate_selection(&self) -> Result<(), ModelError> {
        if let Some(layer_id) = self.selected_layer_id {
            let node = self.node(layer_id).ok_or(ModelError::MissingLayer(layer_id))?;
            if let Some(strand_id) = self.selected_strand_id
                && let LayerNode::Layer(l) = node
                && l.strand(strand_id).is_none()
            {
                return Err(ModelError::SelectionMismatch {
                    strand: strand_id,
                    layer: layer_id,
                });
            }
        } else if let Some(strand_id) = self.selected_strand_id
            && self.strand(strand_id).is_none()
        {
            return Err(ModelError::MissingStrand(strand_id));
        }
        Ok(())
    }

    // ─── Load repair ────────────────────────────────────────────────────

    /// Normalize a freshly loaded document: refresh cached lengths and
    /// mirror fields, and fill in logical handles the file did not carry.
    pub fn repaired(&self) -> Self {
        let layers = layer::map_leaves(&self.layers, &mut |l| Layer {
            strands: l.strands.iter().map(repair_strand).collect(),
            ..l.clone()
        });
        self.with_layers(layers).with_selection_pruned()
    }

    pub fn statistics(&self) -> CanvasStatistics {
        let mut stats = CanvasStatistics {
            zoom: self.zoom,
            grid_enabled: self.grid_enabled,
            grid_size: self.grid_size,
            ..CanvasStatistics::default()
        };
        fn walk(node: &LayerNode, stats: &mut CanvasStatistics) {
            match node {
                LayerNode::Group(g) => {
                    stats.groups += 1;
                    for child in &g.layers {
                        walk(child, stats);
                    }
                }
                LayerNode::Layer(l) => {
                    stats.layers += 1;
                    stats.strands += l.strands.len();
                    stats.attached_strands += l.strands.iter().filter(|s| s.is_attached()).count();
                    stats.masked_strands += l.strands.iter().filter(|s| s.is_masked()).count();
                }
            }
        }
        for node in &self.layers {
            walk(node, &mut stats);
        }
        stats
    }
}

fn repair_strand(s: &Strand) -> Strand {
    let mut s = s.clone();
    s.segments = s.segments.iter().map(|seg| Segment::new(seg.bezier)).collect();
    let s = s.sync_mirrors();
    let (Some(first), Some(last)) = (s.segments.first(), s.segments.last()) else {
        return s;
    };
    let handles_missing = s.control_point1 == Point::ORIGIN
        && s.control_point2 == Point::ORIGIN
        && s.start != Point::ORIGIN;
    if !handles_missing {
        return s;
    }
    let controls_missing =
        first.bezier.control1 == Point::ORIGIN && first.bezier.control2 == Point::ORIGIN;
    if s.segments.len() == 1 && controls_missing {
        return s.with_control_points_from_geometry();
    }
    let mut out = s.clone();
    out.control_point1 = first.bezier.control1;
    out.control_point2 = last.bezier.control2;
    out.with_shape_updated()
}

/// Totals by entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasStatistics {
    pub layers: usize,
    pub groups: usize,
    pub strands: usize,
    pub attached_strands: usize,
    pub masked_strands: usize,
    pub zoom: f64,
    pub grid_enabled: bool,
    pub grid_size: f64,
}

impl fmt::Display for CanvasStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OpenStrand Studio Project Statistics")?;
        writeln!(f)?;
        writeln!(f, "Total Layers: {}", self.layers)?;
        writeln!(f, "Total Groups: {}", self.groups)?;
        writeln!(f, "Total Strands: {}", self.strands)?;
        writeln!(f, "Attached Strands: {}", self.attached_strands)?;
        writeln!(f, "Masked Strands: {}", self.masked_strands)?;
        writeln!(f, "Zoom Level: {}", self.zoom)?;
        writeln!(f, "Grid Enabled: {}", self.grid_enabled)?;
        writeln!(f, "Grid Size: {}", self.grid_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::GroupLayer;
    use crate::strand::{Attachment, StrandStyle};
    use pretty_assertions::assert_eq;

    fn line(name: &str, a: (f64, f64), b: (f64, f64)) -> Strand {
        Strand::straight(
            StrandId::intern(name),
            Point::new(a.0, a.1),
            Point::new(b.0, b.1),
            StrandStyle::default(),
        )
    }

    /// parent → child → grandchild, each pinned to the previous end.
    fn chain() -> CanvasState {
        let parent = line("chain_parent", (0.0, 0.0), (100.0, 0.0));
        let child = Strand::from_parent(StrandId::intern("chain_child"), &parent, parent.end, Side::End)
            .update_endpoint(Point::new(200.0, 0.0));
        let grandchild =
            Strand::from_parent(StrandId::intern("chain_grandchild"), &child, child.end, Side::End)
                .update_endpoint(Point::new(300.0, 0.0));
        let parent = parent.with_child_registered(Side::End, child.id);
        let child = child.with_child_registered(Side::End, grandchild.id);
        // Grandchild first in paint order so a naive pass would lag.
        let layer = Layer::new(LayerId::intern("chain_layer"), "Chain")
            .with_strand(grandchild)
            .with_strand(child)
            .with_strand(parent);
        CanvasState {
            layers: vec![layer.into()],
            ..CanvasState::empty()
        }
    }

    #[test]
    fn new_canvas_has_default_layer() {
        let c = CanvasState::new();
        assert_eq!(c.layers.len(), 1);
        assert_eq!(c.layers[0].name(), "Set 1");
        assert_eq!(c.selected_layer_id, Some(LayerId::intern("layer-1")));
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn propagation_follows_topological_order() {
        let canvas = chain();
        assert_eq!(canvas.validate(), Ok(()));
        let parent = canvas.strand(StrandId::intern("chain_parent")).unwrap();
        let moved = parent.with_endpoint_dragged(Side::End, Point::new(100.0, 50.0));
        let next = canvas.with_strand_replaced(&moved).with_attachments_propagated();

        let child = next.strand(StrandId::intern("chain_child")).unwrap();
        assert_eq!(child.start, Point::new(100.0, 50.0));
        let grandchild = next.strand(StrandId::intern("chain_grandchild")).unwrap();
        assert_eq!(grandchild.start, child.end);
        assert_eq!(next.validate(), Ok(()));
    }

    #[test]
    fn removing_parent_releases_children() {
        let canvas = chain();
        let next = canvas.with_strand_removed(StrandId::intern("chain_parent"));
        let child = next.strand(StrandId::intern("chain_child")).unwrap();
        assert!(!child.start_attached);
        assert_eq!(child.parent_id, None);
        assert_eq!(next.validate(), Ok(()));

        let next = canvas.with_strand_removed(StrandId::intern("chain_child"));
        let parent = next.strand(StrandId::intern("chain_parent")).unwrap();
        assert!(parent.attached_strand_ids.is_empty());
        assert_eq!(parent.has_circles, [false, false]);
        assert_eq!(next.validate(), Ok(()));
    }

    #[test]
    fn validation_catches_dangling_and_unregistered() {
        let parent = line("v_parent", (0.0, 0.0), (10.0, 0.0));
        let child = Strand::from_parent(StrandId::intern("v_child"), &parent, parent.end, Side::End);
        let layer = Layer::new(LayerId::intern("v_layer"), "V")
            .with_strand(parent.clone())
            .with_strand(child.clone());
        let canvas = CanvasState {
            layers: vec![layer.into()],
            ..CanvasState::empty()
        };
        assert_eq!(
            canvas.validate_strands(&[child.id]),
            Err(ModelError::UnregisteredChild {
                child: child.id,
                parent: parent.id
            })
        );

        let orphan = Strand::initial(StrandId::intern("v_orphan"), Point::ORIGIN, StrandStyle::default())
            .attach_end(Attachment::to_endpoint(&line("v_ghost", (0.0, 0.0), (1.0, 0.0)), Side::End));
        let canvas = canvas.with_strand_added(LayerId::intern("v_layer"), orphan.clone()).unwrap();
        assert!(matches!(
            canvas.validate_strands(&[orphan.id]),
            Err(ModelError::DanglingAttachment { .. })
        ));
    }

    #[test]
    fn selection_must_resolve() {
        let mut canvas = CanvasState::new();
        canvas.selected_strand_id = Some(StrandId::intern("sel_missing"));
        assert!(matches!(
            canvas.validate(),
            Err(ModelError::SelectionMismatch { .. })
        ));
        assert_eq!(canvas.with_selection_pruned().selected_strand_id, None);
    }

    #[test]
    fn screen_to_canvas_conversion() {
        let mut canvas = CanvasState::new();
        canvas.zoom = 2.0;
        canvas.pan_offset = Vec2::new(10.0, 20.0);
        assert_eq!(canvas.to_canvas(Point::new(30.0, 40.0)), Point::new(10.0, 10.0));
    }

    #[test]
    fn statistics_count_groups_and_layers() {
        let group = GroupLayer::new(LayerId::intern("stats_group"), "G").with_layer(
            Layer::new(LayerId::intern("stats_inner"), "Inner")
                .with_strand(line("stats_a", (0.0, 0.0), (1.0, 1.0)))
                .into(),
        );
        let canvas = CanvasState {
            layers: vec![
                Layer::new(LayerId::intern("stats_flat"), "Flat")
                    .with_strand(line("stats_b", (0.0, 0.0), (1.0, 1.0)))
                    .into(),
                group.into(),
            ],
            ..CanvasState::empty()
        };
        let stats = canvas.statistics();
        assert_eq!((stats.layers, stats.groups, stats.strands), (2, 1, 2));
        let text = stats.to_string();
        assert!(text.contains("Total Strands: 2"));
        assert!(text.contains("Grid Size: 20"));
    }

    #[test]
    fn repair_fills_missing_handles() {
        let mut s = line("repair_me", (30.0, 0.0), (90.0, 0.0));
        s.control_point1 = Point::ORIGIN;
        s.control_point2 = Point::ORIGIN;
        s.start = Point::ORIGIN;
        let canvas = CanvasState::new()
            .with_strand_added(LayerId::intern("layer-1"), s)
            .unwrap()
            .repaired();
        let fixed = canvas.strand(StrandId::intern("repair_me")).unwrap();
        assert_eq!(fixed.start, Point::new(30.0, 0.0));
        assert_eq!(fixed.control_point1, Point::new(50.0, 0.0));
        assert_eq!(fixed.control_point2, Point::new(70.0, 0.0));
    }
}
