//! Layers and group layers.
//!
//! A [`Layer`] owns strands in paint order; a [`GroupLayer`] owns other
//! layers. Visibility and lock compose down the tree: a strand is shown
//! only when every ancestor is visible.

use crate::id::{LayerId, StrandId};
use crate::strand::Strand;
use serde::{Deserialize, Serialize};

fn yes() -> bool {
    true
}

fn full_opacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    #[serde(default)]
    pub strands: Vec<Strand>,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "full_opacity")]
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLayer {
    pub id: LayerId,
    pub name: String,
    pub layers: Vec<LayerNode>,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "yes")]
    pub expanded: bool,
}

/// Entry of a layer list. Groups are recognised by their `layers` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerNode {
    Group(GroupLayer),
    Layer(Layer),
}

impl Layer {
    pub fn new(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            strands: Vec::new(),
            visible: true,
            locked: false,
            opacity: 1.0,
        }
    }

    pub fn strand(&self, id: StrandId) -> Option<&Strand> {
        self.strands.iter().find(|s| s.id == id)
    }

    pub fn with_strand(&self, strand: Strand) -> Self {
        let mut out = self.clone();
        out.strands.push(strand);
        out
    }

    pub fn without_strand(&self, id: StrandId) -> Self {
        let mut out = self.clone();
        out.strands.retain(|s| s.id != id);
        out
    }

    /// Replace the strand with the same id; unknown ids are ignored.
    pub fn with_strand_replaced(&self, strand: &Strand) -> Self {
        let mut out = self.clone();
        if let Some(slot) = out.strands.iter_mut().find(|s| s.id == strand.id) {
            *slot = strand.clone();
        }
        out
    }

    pub fn with_opacity(&self, opacity: f64) -> Self {
        let mut out = self.clone();
        out.opacity = opacity.clamp(0.0, 1.0);
        out
    }
}

impl GroupLayer {
    pub fn new(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            layers: Vec::new(),
            visible: true,
            locked: false,
            expanded: true,
        }
    }

    pub fn with_layer(&self, node: LayerNode) -> Self {
        let mut out = self.clone();
        out.layers.push(node);
        out
    }

    pub fn without_layer(&self, id: LayerId) -> Self {
        let mut out = self.clone();
        out.layers.retain(|l| l.id() != id);
        out
    }
}

impl From<Layer> for LayerNode {
    fn from(layer: Layer) -> Self {
        LayerNode::Layer(layer)
    }
}

impl From<GroupLayer> for LayerNode {
    fn from(group: GroupLayer) -> Self {
        LayerNode::Group(group)
    }
}

impl LayerNode {
    pub fn id(&self) -> LayerId {
        match self {
            LayerNode::Group(g) => g.id,
            LayerNode::Layer(l) => l.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LayerNode::Group(g) => &g.name,
            LayerNode::Layer(l) => &l.name,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, LayerNode::Group(_))
    }

    pub fn is_visible(&self) -> bool {
        match self {
            LayerNode::Group(g) => g.visible,
            LayerNode::Layer(l) => l.visible,
        }
    }

    pub fn is_locked(&self) -> bool {
        match self {
            LayerNode::Group(g) => g.locked,
            LayerNode::Layer(l) => l.locked,
        }
    }

    pub fn as_layer(&self) -> Option<&Layer> {
        match self {
            LayerNode::Layer(l) => Some(l),
            LayerNode::Group(_) => None,
        }
    }

    /// Every strand under this node in paint order.
    pub fn all_strands(&self) -> Vec<&Strand> {
        match self {
            LayerNode::Layer(l) => l.strands.iter().collect(),
            LayerNode::Group(g) => g.layers.iter().flat_map(LayerNode::all_strands).collect(),
        }
    }

    pub fn count_strands(&self) -> usize {
        match self {
            LayerNode::Layer(l) => l.strands.len(),
            LayerNode::Group(g) => g.layers.iter().map(LayerNode::count_strands).sum(),
        }
    }

    pub fn toggled_visibility(&self) -> Self {
        let mut out = self.clone();
        match &mut out {
            LayerNode::Group(g) => g.visible = !g.visible,
            LayerNode::Layer(l) => l.visible = !l.visible,
        }
        out
    }

    pub fn toggled_lock(&self) -> Self {
        let mut out = self.clone();
        match &mut out {
            LayerNode::Group(g) => g.locked = !g.locked,
            LayerNode::Layer(l) => l.locked = !l.locked,
        }
        out
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut out = self.clone();
        match &mut out {
            LayerNode::Group(g) => g.name = name.into(),
            LayerNode::Layer(l) => l.name = name.into(),
        }
        out
    }

    /// Opacity applies to flat layers only; groups are returned unchanged.
    pub fn with_opacity(&self, opacity: f64) -> Self {
        match self {
            LayerNode::Layer(l) => LayerNode::Layer(l.with_opacity(opacity)),
            LayerNode::Group(_) => self.clone(),
        }
    }

    pub fn toggled_expanded(&self) -> Self {
        let mut out = self.clone();
        if let LayerNode::Group(g) = &mut out {
            g.expanded = !g.expanded;
        }
        out
    }
}

// ─── Tree traversal ─────────────────────────────────────────────────────

/// A flat layer together with the state it inherits from its ancestors.
#[derive(Debug, Clone, Copy)]
pub struct LeafLayer<'a> {
    pub layer: &'a Layer,
    /// Visible itself and through every ancestor group.
    pub visible: bool,
    /// Locked itself or by any ancestor group.
    pub locked: bool,
    /// Id of the top-level entry this layer sits under.
    pub root: LayerId,
}

/// Flat layers in paint order (depth-first, first = bottom).
pub fn leaf_layers(nodes: &[LayerNode]) -> Vec<LeafLayer<'_>> {
    let mut out = Vec::new();
    for node in nodes {
        collect_leaves(node, true, false, node.id(), &mut out);
    }
    out
}

fn collect_leaves<'a>(
    node: &'a LayerNode,
    visible: bool,
    locked: bool,
    root: LayerId,
    out: &mut Vec<LeafLayer<'a>>,
) {
    match node {
        LayerNode::Layer(layer) => out.push(LeafLayer {
            layer,
            visible: visible && layer.visible,
            locked: locked || layer.locked,
            root,
        }),
        LayerNode::Group(group) => {
            for child in &group.layers {
                collect_leaves(
                    child,
                    visible && group.visible,
                    locked || group.locked,
                    root,
                    out,
                );
            }
        }
    }
}

/// Find a node by id anywhere in the tree.
pub fn find_node(nodes: &[LayerNode], id: LayerId) -> Option<&LayerNode> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let LayerNode::Group(g) = node
            && let Some(found) = find_node(&g.layers, id)
        {
            return Some(found);
        }
    }
    None
}

/// Rebuild the tree with the node `id` replaced by `f(node)`.
/// Returns `None` when no node has that id.
pub fn map_node(
    nodes: &[LayerNode],
    id: LayerId,
    f: &mut dyn FnMut(&LayerNode) -> LayerNode,
) -> Option<Vec<LayerNode>> {
    for (i, node) in nodes.iter().enumerate() {
        let replaced = if node.id() == id {
            Some(f(node))
        } else if let LayerNode::Group(g) = node {
            map_node(&g.layers, id, f).map(|layers| {
                LayerNode::Group(GroupLayer {
                    layers,
                    ..g.clone()
                })
            })
        } else {
            None
        };
        if let Some(replacement) = replaced {
            let mut out = nodes.to_vec();
            out[i] = replacement;
            return Some(out);
        }
    }
    None
}

/// Rebuild the tree applying `f` to every flat layer.
pub fn map_leaves(nodes: &[LayerNode], f: &mut dyn FnMut(&Layer) -> Layer) -> Vec<LayerNode> {
    nodes
        .iter()
        .map(|node| match node {
            LayerNode::Layer(l) => LayerNode::Layer(f(l)),
            LayerNode::Group(g) => LayerNode::Group(GroupLayer {
                layers: map_leaves(&g.layers, f),
                ..g.clone()
            }),
        })
        .collect()
}

/// Remove the node `id` wherever it sits. Returns `None` when absent.
pub fn remove_node(nodes: &[LayerNode], id: LayerId) -> Option<Vec<LayerNode>> {
    if nodes.iter().any(|n| n.id() == id) {
        return Some(nodes.iter().filter(|n| n.id() != id).cloned().collect());
    }
    for (i, node) in nodes.iter().enumerate() {
        if let LayerNode::Group(g) = node
            && let Some(layers) = remove_node(&g.layers, id)
        {
            let mut out = nodes.to_vec();
            out[i] = LayerNode::Group(GroupLayer {
                layers,
                ..g.clone()
            });
            return Some(out);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strand::StrandStyle;
    use kurbo::Point;
    use pretty_assertions::assert_eq;

    fn strand(name: &str) -> Strand {
        Strand::straight(
            StrandId::intern(name),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            StrandStyle::default(),
        )
    }

    fn layer(name: &str, strands: &[&str]) -> Layer {
        strands
            .iter()
            .fold(Layer::new(LayerId::intern(name), name), |l, s| {
                l.with_strand(strand(s))
            })
    }

    #[test]
    fn strand_crud() {
        let l = layer("crud", &["crud_a", "crud_b"]);
        assert_eq!(l.strands.len(), 2);
        assert!(l.strand(StrandId::intern("crud_a")).is_some());

        let mut changed = strand("crud_a");
        changed.locked = true;
        let l2 = l.with_strand_replaced(&changed);
        assert!(l2.strand(changed.id).unwrap().locked);
        assert!(!l.strand(changed.id).unwrap().locked, "original untouched");

        let l3 = l2.without_strand(changed.id);
        assert_eq!(l3.strands.len(), 1);
    }

    #[test]
    fn opacity_is_clamped() {
        let l = layer("opacity", &[]);
        assert_eq!(l.with_opacity(1.7).opacity, 1.0);
        assert_eq!(l.with_opacity(-0.2).opacity, 0.0);
        assert_eq!(l.with_opacity(0.4).opacity, 0.4);
    }

    #[test]
    fn group_visibility_composes() {
        let inner = layer("composed_inner", &["composed_s"]);
        let group = GroupLayer::new(LayerId::intern("composed_group"), "Group")
            .with_layer(inner.into());
        let nodes = vec![LayerNode::Group(group).toggled_visibility()];
        let leaves = leaf_layers(&nodes);
        assert_eq!(leaves.len(), 1);
        assert!(!leaves[0].visible);
        assert_eq!(leaves[0].root, LayerId::intern("composed_group"));
    }

    #[test]
    fn all_strands_recurse_through_groups() {
        let group = GroupLayer::new(LayerId::intern("recurse_group"), "G")
            .with_layer(layer("recurse_1", &["r1", "r2"]).into())
            .with_layer(layer("recurse_2", &["r3"]).into());
        let node = LayerNode::Group(group);
        let ids: Vec<_> = node.all_strands().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert_eq!(node.count_strands(), 3);
    }

    #[test]
    fn map_and_remove_nested() {
        let group = GroupLayer::new(LayerId::intern("nest_group"), "G")
            .with_layer(layer("nest_leaf", &[]).into());
        let nodes = vec![layer("nest_top", &[]).into(), LayerNode::Group(group)];

        let renamed = map_node(&nodes, LayerId::intern("nest_leaf"), &mut |n| n.renamed("Leaf"))
            .unwrap();
        let found = find_node(&renamed, LayerId::intern("nest_leaf")).unwrap();
        assert_eq!(found.name(), "Leaf");
        assert!(map_node(&nodes, LayerId::intern("nest_missing"), &mut |n| n.clone()).is_none());

        let removed = remove_node(&renamed, LayerId::intern("nest_leaf")).unwrap();
        assert!(find_node(&removed, LayerId::intern("nest_leaf")).is_none());
        assert_eq!(leaf_layers(&removed).len(), 1);
    }

    #[test]
    fn group_json_is_recognised_by_layers_key() {
        let json = r#"[
            {"id": "json_group", "name": "G", "layers": [
                {"id": "json_leaf", "name": "L", "strands": []}
            ]},
            {"id": "json_flat", "name": "F", "strands": [], "opacity": 0.5}
        ]"#;
        let nodes: Vec<LayerNode> = serde_json::from_str(json).unwrap();
        assert!(nodes[0].is_group());
        assert!(!nodes[1].is_group());
        let LayerNode::Layer(flat) = &nodes[1] else {
            panic!("expected flat layer");
        };
        assert_eq!(flat.opacity, 0.5);
        assert!(flat.visible);
    }
}
