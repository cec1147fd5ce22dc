pub mod attached;
pub mod canvas;
pub mod color;
pub mod error;
pub mod geometry;
pub mod id;
pub mod layer;
pub mod masked;
pub mod strand;

pub use canvas::{CanvasState, CanvasStatistics};
pub use color::Color;
pub use error::ModelError;
pub use geometry::BezierCurve;
pub use id::{LayerId, StrandId};
pub use layer::{GroupLayer, Layer, LayerNode, LeafLayer};
pub use strand::{
    Attachment, Attachments, HandleKind, KnotConnection, KnotConnections, MaskSegment, Segment,
    Side, Strand, StrandStyle, StylePatch,
};

// Re-export kurbo primitives so downstream crates share one geometry vocabulary
pub use kurbo::{Point, Rect, Vec2};
