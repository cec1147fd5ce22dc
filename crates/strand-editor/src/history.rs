//! Undo/redo history of canvas snapshots.
//!
//! Each entry is a full copy of the canvas taken before a mutation.
//! Continuous gestures use batching: the snapshot is captured when the
//! gesture begins and committed once when it ends, and only if the canvas
//! actually changed.

use std::sync::Arc;
use std::time::SystemTime;
use strand_core::CanvasState;

#[derive(Debug, Clone)]
pub struct UndoState {
    pub canvas: Arc<CanvasState>,
    pub timestamp: SystemTime,
    pub description: String,
}

impl UndoState {
    fn new(canvas: &CanvasState, description: &str) -> Self {
        Self {
            canvas: Arc::new(canvas.clone()),
            timestamp: SystemTime::now(),
            description: description.to_string(),
        }
    }
}

pub struct UndoHistory {
    undo_stack: Vec<UndoState>,
    redo_stack: Vec<UndoState>,
    capacity: usize,
    /// Canvas captured by `begin_batch`.
    batch: Option<Arc<CanvasState>>,
}

impl UndoHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(capacity),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
            batch: None,
        }
    }

    /// Record `before` as the state to return to. Clears redo.
    pub fn save_state(&mut self, before: &CanvasState, description: &str) {
        self.push_undo(UndoState::new(before, description));
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, state: UndoState) {
        self.undo_stack.push(state);
        if self.undo_stack.len() > self.capacity {
            self.undo_stack.remove(0);
        }
    }

    /// Step back. `live` is the canvas being replaced; it becomes the
    /// redo target.
    pub fn undo(&mut self, live: &CanvasState) -> Option<Arc<CanvasState>> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack
            .push(UndoState::new(live, &previous.description));
        Some(previous.canvas)
    }

    pub fn redo(&mut self, live: &CanvasState) -> Option<Arc<CanvasState>> {
        let next = self.redo_stack.pop()?;
        self.push_undo(UndoState::new(live, &next.description));
        Some(next.canvas)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|s| s.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|s| s.description.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch = None;
    }

    // ─── Batching ───────────────────────────────────────────────────────

    /// Capture the canvas at the start of a gesture. Nested calls keep
    /// the outermost capture.
    pub fn begin_batch(&mut self, canvas: &Arc<CanvasState>) {
        if self.batch.is_none() {
            self.batch = Some(Arc::clone(canvas));
        }
    }

    /// Close the gesture. Pushes one entry when `canvas` differs from the
    /// captured state and returns whether it did.
    pub fn end_batch(&mut self, canvas: &CanvasState, description: &str) -> bool {
        let Some(before) = self.batch.take() else {
            return false;
        };
        if *before == *canvas {
            return false;
        }
        self.save_state(&before, description);
        true
    }

    /// Abandon the gesture, returning the captured canvas.
    pub fn cancel_batch(&mut self) -> Option<Arc<CanvasState>> {
        self.batch.take()
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn zoomed(z: f64) -> CanvasState {
        CanvasState {
            zoom: z,
            ..CanvasState::new()
        }
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut history = UndoHistory::new(50);
        let s = zoomed(1.0);
        let s2 = zoomed(2.0);
        history.save_state(&s, "Zoom");
        assert_eq!(history.undo_description(), Some("Zoom"));

        let back = history.undo(&s2).unwrap();
        assert_eq!(*back, s);
        assert!(history.can_redo());
        assert_eq!(history.redo_description(), Some("Zoom"));

        let forward = history.redo(&back).unwrap();
        assert_eq!(*forward, s2);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn new_action_clears_redo() {
        let mut history = UndoHistory::new(50);
        history.save_state(&zoomed(1.0), "a");
        history.undo(&zoomed(2.0));
        assert!(history.can_redo());
        history.save_state(&zoomed(3.0), "b");
        assert!(!history.can_redo());
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut history = UndoHistory::new(3);
        for i in 0..5 {
            history.save_state(&zoomed(i as f64), &format!("step {i}"));
        }
        assert_eq!(history.undo_len(), 3);
        let mut live = zoomed(99.0);
        let mut seen = Vec::new();
        while let Some(s) = history.undo(&live) {
            seen.push(s.zoom);
            live = (*s).clone();
        }
        assert_eq!(seen, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn empty_stacks_return_none() {
        let mut history = UndoHistory::new(50);
        assert!(history.undo(&zoomed(1.0)).is_none());
        assert!(history.redo(&zoomed(1.0)).is_none());
        assert_eq!(history.undo_description(), None);
    }

    #[test]
    fn batch_records_once_and_only_on_change() {
        let mut history = UndoHistory::new(50);
        let before = Arc::new(zoomed(1.0));
        history.begin_batch(&before);
        history.begin_batch(&Arc::new(zoomed(7.0)));
        assert!(history.end_batch(&zoomed(2.0), "Move strand"));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(*history.undo(&zoomed(2.0)).unwrap(), *before);

        history.begin_batch(&before);
        assert!(!history.end_batch(&before, "Move strand"));
        assert!(!history.end_batch(&before, "Move strand"));
        assert_eq!(history.undo_len(), 0);
    }
}
