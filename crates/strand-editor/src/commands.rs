//! Commands issued by UI collaborators (layer panel, toolbar, keyboard).
//!
//! Changes to the layer tree or to strands record one undo entry each.
//! Selection, view toggles and panel state are not undoable.

use crate::controller::{Controller, Mode};
use strand_core::canvas::{DEFAULT_LAYER_ID, DEFAULT_LAYER_NAME};
use strand_core::layer::{map_node, remove_node};
use strand_core::{CanvasState, GroupLayer, Layer, LayerId, LayerNode, StrandId, StylePatch};

#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    // ── Layers ──
    SelectLayer(LayerId),
    ToggleVisibility(LayerId),
    ToggleLock(LayerId),
    /// New "Set N" layer, or the selected one if it is still empty.
    AddLayer,
    DeleteLayer(LayerId),
    RenameLayer { layer: LayerId, name: String },
    SetOpacity { layer: LayerId, opacity: f64 },
    CreateGroup { name: String, layers: Vec<LayerId> },
    MoveLayerIntoGroup { layer: LayerId, group: LayerId },
    ToggleExpanded(LayerId),

    // ── Mode & view ──
    SetMode(Mode),
    ToggleGrid,
    ToggleShadows,
    ToggleControlPoints,
    ZoomIn,
    ZoomOut,
    ResetView,
    DeselectAll,

    // ── Edit ──
    Undo,
    Redo,
    SetColor(String),
    SetWidth(f64),
    ApplyStyle(StylePatch),
    DeleteSelectedStrand,
    AdjustAngle {
        strand: StrandId,
        degrees: f64,
        length: Option<f64>,
    },
}

impl Controller {
    /// Run `command`. Returns whether it had an effect.
    pub fn execute(&mut self, command: EditorCommand) -> bool {
        log::debug!("command {command:?}");
        match command {
            EditorCommand::SelectLayer(id) => self.select_layer(id),
            EditorCommand::ToggleVisibility(id) => {
                self.update_node(id, LayerNode::toggled_visibility, "Toggle visibility")
            }
            EditorCommand::ToggleLock(id) => self.update_node(id, LayerNode::toggled_lock, "Toggle lock"),
            EditorCommand::AddLayer => self.add_layer(),
            EditorCommand::DeleteLayer(id) => self.delete_layer(id),
            EditorCommand::RenameLayer { layer, name } => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return false;
                }
                self.update_node(layer, |n| n.renamed(name.clone()), "Rename layer")
            }
            EditorCommand::SetOpacity { layer, opacity } => {
                if !opacity.is_finite() {
                    return false;
                }
                let opacity = opacity.clamp(0.0, 1.0);
                self.update_node(layer, |n| n.with_opacity(opacity), "Set opacity")
            }
            EditorCommand::CreateGroup { name, layers } => self.create_group(name, &layers),
            EditorCommand::MoveLayerIntoGroup { layer, group } => self.move_into_group(layer, group),
            EditorCommand::ToggleExpanded(id) => {
                match self.canvas.with_node_updated(id, LayerNode::toggled_expanded) {
                    Some(next) => {
                        self.publish(next);
                        true
                    }
                    None => false,
                }
            }
            EditorCommand::SetMode(mode) => {
                self.set_mode(mode);
                true
            }
            EditorCommand::ToggleGrid => {
                self.toggle_grid();
                true
            }
            EditorCommand::ToggleShadows => {
                self.toggle_shadows();
                true
            }
            EditorCommand::ToggleControlPoints => {
                self.toggle_control_points();
                true
            }
            EditorCommand::ZoomIn => {
                self.zoom_in();
                true
            }
            EditorCommand::ZoomOut => {
                self.zoom_out();
                true
            }
            EditorCommand::ResetView => {
                self.reset_view();
                true
            }
            EditorCommand::DeselectAll => {
                self.deselect_all();
                true
            }
            EditorCommand::Undo => self.undo(),
            EditorCommand::Redo => self.redo(),
            EditorCommand::SetColor(color) => {
                self.set_current_color(color);
                true
            }
            EditorCommand::SetWidth(width) => {
                self.set_current_width(width);
                width > 0.0
            }
            EditorCommand::ApplyStyle(patch) => self.apply_style(&patch),
            EditorCommand::DeleteSelectedStrand => self.delete_selected_strand(),
            EditorCommand::AdjustAngle {
                strand,
                degrees,
                length,
            } => self.adjust_angle(strand, degrees, length),
        }
    }

    fn update_node(
        &mut self,
        id: LayerId,
        f: impl FnMut(&LayerNode) -> LayerNode,
        description: &str,
    ) -> bool {
        match self.canvas.with_node_updated(id, f) {
            Some(next) if next != *self.canvas => self.commit_undoable(next, &[], description),
            _ => false,
        }
    }

    fn select_layer(&mut self, id: LayerId) -> bool {
        if self.canvas.node(id).is_none() {
            return false;
        }
        let next = CanvasState {
            selected_layer_id: Some(id),
            ..(*self.canvas).clone()
        }
        .with_selection_pruned();
        self.publish(next);
        true
    }

    fn add_layer(&mut self) -> bool {
        let reusable = self
            .canvas
            .selected_layer_id
            .and_then(|id| self.canvas.layer(id))
            .is_some_and(|l| l.strands.is_empty());
        if !reusable {
            let id = LayerId::fresh();
            let name = next_set_name(&self.canvas);
            let mut layers = self.canvas.layers.clone();
            layers.push(Layer::new(id, name).into());
            let mut next = self.canvas.with_layers(layers);
            next.selected_layer_id = Some(id);
            next.selected_strand_id = None;
            if !self.commit_undoable(next, &[], "Add layer") {
                return false;
            }
        }
        self.set_mode(Mode::Attach);
        true
    }

    fn delete_layer(&mut self, id: LayerId) -> bool {
        let Some(node) = self.canvas.node(id) else {
            return false;
        };
        let doomed: Vec<StrandId> = node.all_strands().iter().map(|s| s.id).collect();
        let mut next = (*self.canvas).clone();
        for strand in doomed {
            next = next.with_strand_removed(strand);
        }
        let Some(mut layers) = remove_node(&next.layers, id) else {
            return false;
        };
        if layers.is_empty() {
            layers.push(Layer::new(LayerId::intern(DEFAULT_LAYER_ID), DEFAULT_LAYER_NAME).into());
        }
        next = next.with_layers(layers);
        if next.selected_layer_id.is_none_or(|sel| next.node(sel).is_none()) {
            let first = next.leaf_layers().first().map(|leaf| leaf.layer.id);
            next.selected_layer_id = first;
        }
        let next = next.with_selection_pruned();
        self.commit_undoable(next, &[], "Delete layer")
    }

    fn create_group(&mut self, name: String, members: &[LayerId]) -> bool {
        let mut group = GroupLayer::new(LayerId::fresh(), name);
        let mut layers = self.canvas.layers.clone();
        for &id in members {
            let Some(node) = strand_core::layer::find_node(&layers, id).cloned() else {
                log::warn!("layer {id} not found, left out of the group");
                continue;
            };
            if let Some(rest) = remove_node(&layers, id) {
                layers = rest;
                group = group.with_layer(node);
            }
        }
        layers.push(group.into());
        let next = self.canvas.with_layers(layers).with_selection_pruned();
        self.commit_undoable(next, &[], "Create group")
    }

    fn move_into_group(&mut self, layer: LayerId, group: LayerId) -> bool {
        if layer == group {
            return false;
        }
        let Some(node) = self.canvas.node(layer).cloned() else {
            return false;
        };
        if !matches!(self.canvas.node(group), Some(LayerNode::Group(_))) {
            return false;
        }
        // A group cannot move into its own subtree.
        if let LayerNode::Group(g) = &node
            && strand_core::layer::find_node(&g.layers, group).is_some()
        {
            log::debug!("refusing to nest {layer} inside its descendant {group}");
            return false;
        }
        let Some(rest) = remove_node(&self.canvas.layers, layer) else {
            return false;
        };
        let Some(layers) = map_node(&rest, group, &mut |target| match target {
            LayerNode::Group(g) => LayerNode::Group(g.with_layer(node.clone())),
            other => other.clone(),
        }) else {
            return false;
        };
        let next = self.canvas.with_layers(layers);
        self.commit_undoable(next, &[], "Move layer into group")
    }

    fn apply_style(&mut self, patch: &StylePatch) -> bool {
        let Some(strand) = self.canvas.selected_strand() else {
            return false;
        };
        let id = strand.id;
        let styled = strand.with_style(patch);
        if styled == *strand {
            return false;
        }
        let next = self.canvas.with_strand_replaced(&styled);
        self.commit_undoable(next, &[id], "Change style")
    }

    fn delete_selected_strand(&mut self) -> bool {
        let Some(id) = self.canvas.selected_strand_id else {
            return false;
        };
        if self.canvas.is_strand_locked(id) {
            log::debug!("strand {id} is locked");
            return false;
        }
        let next = self.canvas.with_strand_removed(id);
        self.commit_undoable(next, &[], "Delete strand")
    }
}

/// First "Set N" from `layers + 1` upward that no layer or group is named.
fn next_set_name(canvas: &CanvasState) -> String {
    let leaves = canvas.leaf_layers();
    let taken: Vec<&str> = canvas
        .layers
        .iter()
        .map(LayerNode::name)
        .chain(leaves.iter().map(|leaf| leaf.layer.name.as_str()))
        .collect();
    (canvas.layers.len() + 1..)
        .map(|n| format!("Set {n}"))
        .find(|name| !taken.contains(&name.as_str()))
        .unwrap_or_default()
}
