//! Gesture input.
//!
//! Touch recognizers (pan, tap, double-tap, pinch) are normalized into
//! [`GestureEvent`]s in screen coordinates. The controller converts them
//! to canvas coordinates using the current zoom and pan offset.

use kurbo::{Point, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Single-finger drag started.
    PanBegin { at: Point },
    /// `translation` is the total screen offset since `PanBegin`.
    PanUpdate { at: Point, translation: Vec2 },
    PanEnd { at: Point },
    /// Recognizer gave up on the current drag.
    PanCancel,
    Tap { at: Point },
    DoubleTap { at: Point },
    /// `scale` is relative to the previous pinch event.
    Pinch { scale: f64, focal: Point },
}

impl GestureEvent {
    pub fn pan(from: Point, to: Point) -> [Self; 3] {
        [
            Self::PanBegin { at: from },
            Self::PanUpdate {
                at: to,
                translation: to - from,
            },
            Self::PanEnd { at: to },
        ]
    }

    /// Screen position, if the event has one.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PanBegin { at }
            | Self::PanUpdate { at, .. }
            | Self::PanEnd { at }
            | Self::Tap { at }
            | Self::DoubleTap { at } => Some(*at),
            Self::Pinch { focal, .. } => Some(*focal),
            Self::PanCancel => None,
        }
    }
}
