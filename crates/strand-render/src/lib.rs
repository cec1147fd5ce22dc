//! Hit testing and scene rendering for strand canvases.
//!
//! [`hit`] answers "what is under this point", [`paint`] turns a canvas
//! snapshot into drawing elements and [`svg`] serializes them.

pub mod hit;
pub mod paint;
pub mod svg;

pub use hit::{ControlPointHit, EndpointHit, StrandHit};
pub use paint::{
    Overlay, PaintRole, PreviewLine, RenderOptions, Scene, SceneElement, Stroke, render_scene,
    segment_path,
};
pub use svg::{SvgExport, drawing_bounds, export_svg, export_svg_cropped, scene_to_svg};
