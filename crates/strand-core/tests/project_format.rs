//! Integration tests: `.oss` project documents (strand-core).
//!
//! Loads a hand-written project mixing flat layers, a group layer, an
//! attachment pair, a mask and a legacy strand without logical handles.

use pretty_assertions::assert_eq;
use strand_core::*;

fn load_fixture() -> CanvasState {
    let input = include_str!("fixtures/braid.oss");
    let canvas: CanvasState = serde_json::from_str(input).expect("fixture should parse");
    canvas.repaired()
}

#[test]
fn fixture_loads_with_view_state() {
    let canvas = load_fixture();
    assert_eq!(canvas.zoom, 1.5);
    assert_eq!(canvas.pan_offset, Vec2::new(10.0, -20.0));
    assert!(canvas.grid_enabled);
    assert_eq!(canvas.grid_size, 25.0);
    assert_eq!(canvas.selected_strand_id, Some(StrandId::intern("strand_b")));
    assert_eq!(canvas.validate(), Ok(()), "fixture should satisfy invariants");
}

#[test]
fn group_layers_are_recognised() {
    let canvas = load_fixture();
    assert!(!canvas.layers[0].is_group());
    assert!(canvas.layers[1].is_group());
    let LayerNode::Group(group) = &canvas.layers[1] else {
        panic!("expected a group layer");
    };
    assert!(!group.expanded);
    let leaves = canvas.leaf_layers();
    let names: Vec<_> = leaves.iter().map(|l| l.layer.name.as_str()).collect();
    assert_eq!(names, vec!["Set 1", "Set 2"]);
    assert_eq!(leaves[1].layer.opacity, 0.8);
}

#[test]
fn attachment_fields_survive_loading() {
    let canvas = load_fixture();
    let parent = canvas.strand(StrandId::intern("strand_a")).unwrap();
    let child = canvas.strand(StrandId::intern("strand_b")).unwrap();
    assert_eq!(parent.has_circles, [false, true]);
    assert_eq!(parent.attached_strand_ids.as_slice(), &[child.id]);
    assert!(child.start_attached);
    assert_eq!(child.attachment_side, Some(Side::End));
    assert_eq!(child.parent_id, Some(parent.id));
    assert!(child.is_attached());
}

#[test]
fn cached_lengths_are_recomputed() {
    let canvas = load_fixture();
    let child = canvas.strand(StrandId::intern("strand_b")).unwrap();
    let expected = (200.0f64 * 200.0 + 100.0 * 100.0).sqrt();
    assert!(
        (child.segments[0].length - expected).abs() < 1e-6,
        "length {} should be recomputed from the curve",
        child.segments[0].length
    );
}

#[test]
fn legacy_strand_gets_handles_from_geometry() {
    let canvas = load_fixture();
    let legacy = canvas.strand(StrandId::intern("legacy_c")).unwrap();
    assert_eq!(legacy.start, Point::new(0.0, 50.0));
    assert_eq!(legacy.end, Point::new(200.0, 50.0));
    assert!((legacy.control_point1.x - 200.0 / 3.0).abs() < 1e-9);
    assert!((legacy.control_point2.x - 400.0 / 3.0).abs() < 1e-9);
    assert_eq!(legacy.style.color, "#ff0000");
    assert_eq!(legacy.style.stroke_width, 4.0, "missing style keys take defaults");
    assert!(legacy.is_masked());
}

#[test]
fn unknown_fields_round_trip() {
    let canvas = load_fixture();
    let json = serde_json::to_string_pretty(&canvas).unwrap();
    assert!(json.contains("\"desktopLayerName\": \"1_1\""));
    let reloaded: CanvasState = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded, canvas);
}

#[test]
fn minimum_keys_are_always_written() {
    let canvas = CanvasState::new();
    let value = serde_json::to_value(&canvas).unwrap();
    for key in [
        "layers",
        "selectedLayerId",
        "selectedStrandId",
        "zoom",
        "panOffset",
        "gridEnabled",
        "gridSize",
    ] {
        assert!(value.get(key).is_some(), "missing key {key}");
    }
    assert!(value["selectedStrandId"].is_null());
}

#[test]
fn moving_loaded_parent_drags_child() {
    let canvas = load_fixture();
    let parent = canvas.strand(StrandId::intern("strand_a")).unwrap();
    let moved = parent.translated(Vec2::new(0.0, 40.0));
    let next = canvas
        .with_strand_replaced(&moved)
        .with_attachments_propagated();
    let child = next.strand(StrandId::intern("strand_b")).unwrap();
    assert_eq!(child.start, Point::new(300.0, 140.0));
    assert_eq!(child.end, Point::new(500.0, 200.0));
}

#[test]
fn garbage_is_rejected() {
    assert!(serde_json::from_str::<CanvasState>("{\"layers\": 3}").is_err());
    assert!(serde_json::from_str::<CanvasState>("not json").is_err());
}
