//! Derived per-layer view of the canvas for panels and diagnostics.
//!
//! Never persisted with the project. The connection map is frozen while a
//! movement is in progress so observers don't churn during a drag.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use strand_core::{CanvasState, LayerNode, Side, Strand, StrandId};

/// strand id → peer on the start side, peer on the end side.
/// Peers are written `"<id>(<side>)"`.
pub type ConnectionMap = IndexMap<String, [Option<String>; 2]>;

pub type ShadowOverrides = IndexMap<String, IndexMap<String, serde_json::Value>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerState {
    pub order: Vec<String>,
    pub connections: ConnectionMap,
    pub masked_layers: Vec<String>,
    pub colors: IndexMap<String, String>,
    pub positions: IndexMap<String, [f64; 4]>,
    pub selected_strand: Option<String>,
    pub newest_strand: Option<String>,
    pub newest_layer: Option<String>,
    pub shadow_overrides: ShadowOverrides,
}

#[derive(Debug, Default)]
pub struct LayerStateService {
    state: LayerState,
    cached_connections: Option<ConnectionMap>,
}

impl LayerStateService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_movement(&mut self, canvas: &CanvasState) {
        self.cached_connections = Some(connections(&canvas.strands()));
    }

    pub fn end_movement(&mut self) {
        self.cached_connections = None;
    }

    pub fn is_moving(&self) -> bool {
        self.cached_connections.is_some()
    }

    /// Recompute everything except the shadow overrides.
    pub fn save_current_state(&mut self, canvas: &CanvasState) -> &LayerState {
        let entries = flatten(&canvas.layers);
        let strands: Vec<&Strand> = entries.iter().map(|(s, _)| *s).collect();
        let connections = match &self.cached_connections {
            Some(cached) => cached.clone(),
            None => connections(&strands),
        };

        let mut masked_layers: Vec<String> = Vec::new();
        let mut colors = IndexMap::new();
        let mut positions = IndexMap::new();
        for (strand, layer) in &entries {
            if strand.is_masked() && !masked_layers.iter().any(|l| l == layer) {
                masked_layers.push(layer.to_string());
            }
            colors
                .entry(layer.to_string())
                .or_insert_with(|| strand.style.color.clone());
            positions
                .entry(layer.to_string())
                .or_insert([strand.start.x, strand.start.y, strand.end.x, strand.end.y]);
        }

        let shadow_overrides = std::mem::take(&mut self.state.shadow_overrides);
        self.state = LayerState {
            order: canvas
                .leaf_layers()
                .iter()
                .map(|leaf| leaf.layer.name.clone())
                .collect(),
            connections,
            masked_layers,
            colors,
            positions,
            selected_strand: canvas.selected_strand_id.map(|id| id.to_string()),
            newest_strand: strands.last().map(|s| s.id.to_string()),
            newest_layer: canvas.layers.last().map(|n| n.name().to_string()),
            shadow_overrides,
        };
        &self.state
    }

    /// Replace the current state with a previously saved one.
    pub fn apply_loaded_state(&mut self, state: LayerState) {
        self.state = state;
    }

    pub fn state(&self) -> &LayerState {
        &self.state
    }

    pub fn set_shadow_override(&mut self, casting: &str, receiving: &str, data: serde_json::Value) {
        self.state
            .shadow_overrides
            .entry(casting.to_string())
            .or_default()
            .insert(receiving.to_string(), data);
    }

    pub fn shadow_override(&self, casting: &str, receiving: &str) -> Option<&serde_json::Value> {
        self.state.shadow_overrides.get(casting)?.get(receiving)
    }

    pub fn remove_shadow_override(&mut self, casting: &str, receiving: &str) {
        if let Some(inner) = self.state.shadow_overrides.get_mut(casting) {
            inner.shift_remove(receiving);
        }
    }
}

/// Strands with the name of their owning layer, depth-first.
fn flatten(nodes: &[LayerNode]) -> Vec<(&Strand, &str)> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            LayerNode::Layer(l) => out.extend(l.strands.iter().map(|s| (s, l.name.as_str()))),
            LayerNode::Group(g) => out.extend(flatten(&g.layers)),
        }
    }
    out
}

fn peer(id: StrandId, side: Side) -> String {
    format!("{id}({})", side.index())
}

/// Which side of the parent an attachment sits on, falling back to
/// the nearer end when the side was not recorded.
fn resolved_side(explicit: Option<Side>, t: f64) -> Side {
    explicit.unwrap_or(if t <= 0.5 { Side::Start } else { Side::End })
}

pub fn connections(strands: &[&Strand]) -> ConnectionMap {
    let mut map: ConnectionMap = strands
        .iter()
        .map(|s| (s.id.to_string(), [None, None]))
        .collect();
    let mut link = |a: StrandId, a_side: Side, b: StrandId, b_side: Side| {
        map.entry(a.to_string()).or_insert([None, None])[a_side.index()] = Some(peer(b, b_side));
        map.entry(b.to_string()).or_insert([None, None])[b_side.index()] = Some(peer(a, a_side));
    };

    for s in strands {
        if s.is_attached() {
            let start = s.attachment(Side::Start);
            if let Some(parent) = s.parent_id.or(start.map(|a| a.strand_id)) {
                let side = s.attachment_side.unwrap_or_else(|| {
                    start.map_or(Side::End, |a| resolved_side(a.attachment_side, a.t))
                });
                link(s.id, Side::Start, parent, side);
            }
            if let Some(end) = s.attachment(Side::End) {
                link(
                    s.id,
                    Side::End,
                    end.strand_id,
                    resolved_side(end.attachment_side, end.t),
                );
            }
        }
        if let Some(knots) = &s.knot_connections {
            if let Some(k) = &knots.start {
                link(s.id, Side::Start, k.connected_strand_id, k.connected_end);
            }
            if let Some(k) = &knots.end {
                link(s.id, Side::End, k.connected_strand_id, k.connected_end);
            }
        }
    }
    map
}

// ─── Text report ────────────────────────────────────────────────────────

fn write_list(out: &mut String, title: &str, items: &[String]) {
    let _ = writeln!(out, "{title}:");
    if items.is_empty() {
        out.push_str("  (empty)\n");
    }
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

fn write_dict<V>(out: &mut String, title: &str, map: &IndexMap<String, V>, show: impl Fn(&V) -> String) {
    let _ = writeln!(out, "{title}:");
    if map.is_empty() {
        out.push_str("  (empty)\n");
    }
    for (key, value) in map {
        let _ = writeln!(out, "  {key}: {}", show(value));
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = Vec::new();

        let mut s = String::new();
        write_list(&mut s, "Order", &self.order);
        sections.push(s);

        let mut s = String::new();
        write_dict(&mut s, "Connections", &self.connections, |pair| {
            let peers: Vec<String> = pair
                .iter()
                .map(|p| p.as_deref().map_or_else(|| "null".to_string(), json_string))
                .collect();
            format!("[{}]", peers.join(","))
        });
        sections.push(s);

        let mut s = String::new();
        write_list(&mut s, "Masked Layers", &self.masked_layers);
        sections.push(s);

        let mut s = String::new();
        write_dict(&mut s, "Colors", &self.colors, |c| json_string(c));
        sections.push(s);

        let mut s = String::new();
        write_dict(&mut s, "Positions", &self.positions, |p| {
            format!("[{},{},{},{}]", p[0], p[1], p[2], p[3])
        });
        sections.push(s);

        for (title, value) in [
            ("Selected Strand", &self.selected_strand),
            ("Newest Strand", &self.newest_strand),
            ("Newest Layer", &self.newest_layer),
        ] {
            sections.push(format!("{title}:\n  {}\n", value.as_deref().unwrap_or("null")));
        }

        f.write_str(&sections.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strand_core::{
        GroupLayer, KnotConnection, KnotConnections, Layer, LayerId, MaskSegment, Point,
        StrandStyle,
    };

    fn line(name: &str, a: (f64, f64), b: (f64, f64)) -> Strand {
        Strand::initial(StrandId::intern(name), Point::new(a.0, a.1), StrandStyle::default())
            .update_endpoint(Point::new(b.0, b.1))
    }

    fn braid() -> CanvasState {
        let parent = line("ls_parent", (100.0, 100.0), (300.0, 100.0));
        let child = Strand::from_parent(StrandId::intern("ls_child"), &parent, parent.end, Side::End)
            .update_endpoint(Point::new(500.0, 200.0));
        let parent = parent.with_child_registered(Side::End, child.id);
        let mut other = line("ls_other", (0.0, 0.0), (50.0, 50.0));
        other.style.color = "#ff0000".into();
        other.masks.push(MaskSegment {
            strand_id: parent.id,
            segment_index: 0,
            t_start: 0.4,
            t_end: 0.5,
            is_over: false,
        });
        let set1 = Layer::new(LayerId::intern("ls_1"), "Set 1")
            .with_strand(parent)
            .with_strand(child);
        let set2 = Layer::new(LayerId::intern("ls_2"), "Set 2").with_strand(other);
        let group = GroupLayer::new(LayerId::intern("ls_g"), "Group").with_layer(set2.into());
        let mut canvas = CanvasState::empty().with_layers(vec![set1.into(), group.into()]);
        canvas.selected_strand_id = Some(StrandId::intern("ls_child"));
        canvas
    }

    #[test]
    fn derived_fields() {
        let mut service = LayerStateService::new();
        let state = service.save_current_state(&braid()).clone();
        assert_eq!(state.order, vec!["Set 1", "Set 2"]);
        assert_eq!(state.masked_layers, vec!["Set 2"]);
        assert_eq!(state.colors["Set 1"], "#C8AAE6");
        assert_eq!(state.colors["Set 2"], "#ff0000");
        assert_eq!(state.positions["Set 1"], [100.0, 100.0, 300.0, 100.0]);
        assert_eq!(state.selected_strand.as_deref(), Some("ls_child"));
        assert_eq!(state.newest_strand.as_deref(), Some("ls_other"));
        assert_eq!(state.newest_layer.as_deref(), Some("Group"));
    }

    #[test]
    fn order_keeps_repeated_layer_names() {
        let first = Layer::new(LayerId::intern("ls_dup_1"), "Set 1")
            .with_strand(line("ls_dup_a", (0.0, 0.0), (10.0, 0.0)));
        let second = Layer::new(LayerId::intern("ls_dup_2"), "Set 1")
            .with_strand(line("ls_dup_b", (0.0, 20.0), (10.0, 20.0)));
        let canvas = CanvasState::empty().with_layers(vec![first.into(), second.into()]);
        let mut service = LayerStateService::new();
        let state = service.save_current_state(&canvas);
        assert_eq!(state.order, vec!["Set 1", "Set 1"]);
    }

    #[test]
    fn loaded_state_replaces_the_current_one() {
        let mut service = LayerStateService::new();
        service.save_current_state(&braid());
        service.apply_loaded_state(LayerState {
            order: vec!["Loaded".into()],
            ..LayerState::default()
        });
        let state = service.state();
        assert_eq!(state.order, vec!["Loaded"]);
        assert!(state.connections.is_empty());
        assert_eq!(state.selected_strand, None);
    }

    #[test]
    fn attachment_connections_are_symmetric() {
        let mut service = LayerStateService::new();
        let state = service.save_current_state(&braid());
        assert_eq!(
            state.connections["ls_child"],
            [Some("ls_parent(1)".to_string()), None]
        );
        assert_eq!(
            state.connections["ls_parent"],
            [None, Some("ls_child(0)".to_string())]
        );
        assert_eq!(state.connections["ls_other"], [None, None]);
    }

    #[test]
    fn knot_connections_are_linked() {
        let mut a = line("ls_knot_a", (0.0, 0.0), (10.0, 0.0));
        a.knot_connections = Some(KnotConnections {
            start: None,
            end: Some(KnotConnection {
                connected_strand_id: StrandId::intern("ls_knot_b"),
                connected_end: Side::Start,
            }),
        });
        let b = line("ls_knot_b", (10.0, 0.0), (20.0, 0.0));
        let map = connections(&[&a, &b]);
        assert_eq!(map["ls_knot_a"][1].as_deref(), Some("ls_knot_b(0)"));
        assert_eq!(map["ls_knot_b"][0].as_deref(), Some("ls_knot_a(1)"));
    }

    #[test]
    fn connections_freeze_during_movement() {
        let mut service = LayerStateService::new();
        let canvas = braid();
        service.start_movement(&canvas);
        let detached = canvas.with_strand_removed(StrandId::intern("ls_child"));
        let frozen = service.save_current_state(&detached).connections.clone();
        assert!(frozen.contains_key("ls_child"));
        service.end_movement();
        let live = service.save_current_state(&detached);
        assert!(!live.connections.contains_key("ls_child"));
        assert_eq!(live.connections["ls_parent"], [None, None]);
    }

    #[test]
    fn shadow_overrides_survive_recompute() {
        let mut service = LayerStateService::new();
        service.set_shadow_override("Set 1", "Set 2", serde_json::json!({ "visible": false }));
        service.save_current_state(&braid());
        assert_eq!(
            service.shadow_override("Set 1", "Set 2"),
            Some(&serde_json::json!({ "visible": false }))
        );
        service.remove_shadow_override("Set 1", "Set 2");
        assert_eq!(service.shadow_override("Set 1", "Set 2"), None);
    }

    #[test]
    fn report_layout() {
        let mut service = LayerStateService::new();
        let report = service.save_current_state(&CanvasState::new()).to_string();
        let expected = "Order:\n  - Set 1\n\nConnections:\n  (empty)\n\nMasked Layers:\n  (empty)\n\n\
Colors:\n  (empty)\n\nPositions:\n  (empty)\n\nSelected Strand:\n  null\n\n\
Newest Strand:\n  null\n\nNewest Layer:\n  Set 1\n";
        assert_eq!(report, expected);

        let report = service.save_current_state(&braid()).to_string();
        assert!(report.contains("  ls_child: [\"ls_parent(1)\",null]\n"), "{report}");
        assert!(report.contains("  Set 1: [100,100,300,100]\n"), "{report}");
        assert!(report.contains("  Set 2: \"#ff0000\"\n"), "{report}");
    }
}
