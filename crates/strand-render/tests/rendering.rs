//! Integration tests: hit testing and rendering over whole canvases.

use pretty_assertions::assert_eq;
use strand_core::{CanvasState, Layer, LayerId, LayerNode, Point, Strand, StrandId, StrandStyle};
use strand_render::hit::{self, ATTACH_RADIUS, HIT_TOLERANCE};
use strand_render::{PaintRole, RenderOptions, export_svg, render_scene};

fn load_braid() -> CanvasState {
    let input = include_str!("../../strand-core/tests/fixtures/braid.oss");
    let canvas: CanvasState = serde_json::from_str(input).expect("fixture should parse");
    canvas.repaired()
}

fn straight(name: &str, a: (f64, f64), b: (f64, f64)) -> Strand {
    Strand::initial(StrandId::intern(name), Point::new(a.0, a.1), StrandStyle::default())
        .update_endpoint(Point::new(b.0, b.1))
}

#[test]
fn braid_renders_parent_and_child_as_lines() {
    let canvas = load_braid();
    let scene = render_scene(&canvas, &RenderOptions::export());
    let fills = scene.paths(PaintRole::Fill);
    assert_eq!(fills[0], "M 100 100 L 300 100");
    assert_eq!(fills.len(), 3, "two strands in Set 1 and one in the group: {fills:?}");
}

#[test]
fn hidden_layer_is_invisible_to_hits_and_render() {
    let hidden = Layer {
        visible: false,
        ..Layer::new(LayerId::intern("it_hidden"), "Hidden").with_strand(straight(
            "it_hidden_strand",
            (0.0, 0.0),
            (200.0, 0.0),
        ))
    };
    let canvas = CanvasState::empty().with_layers(vec![hidden.into()]);
    for x in [0.0, 50.0, 100.0, 200.0] {
        assert_eq!(
            hit::find_strand_at_point(&canvas.layers, Point::new(x, 0.0), HIT_TOLERANCE),
            None,
            "hidden strand hit at x = {x}"
        );
    }
    assert!(hit::attachable_endpoints(&canvas.layers).is_empty());
    assert!(hit::find_endpoint_attachment(&canvas.layers, Point::ZERO, ATTACH_RADIUS).is_none());
    assert!(render_scene(&canvas, &RenderOptions::default()).elements.is_empty());
}

#[test]
fn hidden_group_hides_its_layers() {
    let canvas = load_braid();
    let LayerNode::Group(group) = &canvas.layers[1] else {
        panic!("expected a group");
    };
    let mut group = group.clone();
    group.visible = false;
    let mut layers = canvas.layers.clone();
    layers[1] = group.into();
    let canvas = canvas.with_layers(layers);
    let scene = render_scene(&canvas, &RenderOptions::export());
    assert_eq!(scene.paths(PaintRole::Fill).len(), 2);
}

#[test]
fn braid_attach_targets_exclude_claimed_sides() {
    let canvas = load_braid();
    let free: Vec<_> = hit::attachable_endpoints(&canvas.layers)
        .into_iter()
        .filter(|e| e.strand_id.as_str().starts_with("strand_"))
        .map(|e| (e.strand_id.as_str(), e.side.index()))
        .collect();
    // strand_a's end is taken by strand_b, strand_b's start is attached.
    assert_eq!(free, vec![("strand_a", 0), ("strand_b", 1)]);
}

#[test]
fn export_contains_one_path_per_painted_stroke() {
    let layer = Layer::new(LayerId::intern("it_export"), "Export")
        .with_strand(straight("it_export_a", (100.0, 100.0), (300.0, 100.0)))
        .with_strand(straight("it_export_b", (300.0, 100.0), (500.0, 200.0)));
    let canvas = CanvasState::empty().with_layers(vec![layer.into()]);
    let svg = export_svg(&canvas, 800.0, 600.0).svg;
    assert_eq!(svg.matches("<path").count(), 6);
    assert_eq!(svg.matches(" L ").count(), 6);
    assert!(!svg.contains(" C "));
}
